//! Headless entry point for the static-file boundary.
//!
//! Runs independently of the Tauri runtime: a plain `axum` server serving
//! `public/` with SPA fallback, for "dictation-only mode" deployments that
//! skip the desktop shell entirely.

use dicktaint_lib::boundary;
use std::net::SocketAddr;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8420);

    let public_dir = std::env::var("DICKTAINT_PUBLIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public"));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("HOST/PORT did not form a valid socket address");

    tracing::info!("serving {} on http://{}", public_dir.display(), addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    axum::serve(listener, boundary::router(public_dir))
        .await
        .expect("static server exited unexpectedly");
}
