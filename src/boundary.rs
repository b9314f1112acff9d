//! Static-file boundary server.
//!
//! Serves static assets from a `public/` root with SPA fallback, rejecting
//! every `/api/*` path outright. This is the one piece of the system that
//! runs independent of the Tauri runtime (a headless `axum` server), so it
//! lives behind a small, directly testable router builder rather than
//! inline in `main`.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::path::{Path, PathBuf};

const API_REJECTION_BODY: &str =
    r#"{"ok":false,"error":"No API routes are enabled in dictation-only mode."}"#;

pub fn router(public_dir: PathBuf) -> Router {
    Router::new().fallback(get(handler)).with_state(public_dir)
}

async fn handler(State(public_dir): State<PathBuf>, headers: HeaderMap, uri: Uri) -> Response {
    let path = uri.path();

    if path == "/api" || path.starts_with("/api/") {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            API_REJECTION_BODY,
        )
            .into_response();
    }

    let Some(resolved) = safe_public_path(&public_dir, path) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if resolved.is_file() {
        return serve_file(&resolved).await;
    }

    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);
    let has_extension = Path::new(path).extension().is_some();

    if wants_html || !has_extension {
        let index = public_dir.join("index.html");
        if index.is_file() {
            return serve_file(&index).await;
        }
    }

    StatusCode::NOT_FOUND.into_response()
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(path)
                .first_raw()
                .unwrap_or("application/octet-stream");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                Body::from(bytes),
            )
                .into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Resolve a request path against `root`, rejecting anything that would
/// escape it. URL-decodes the path and normalizes `.`/`..` components purely
/// lexically (no filesystem access),
/// so a nonexistent target is rejected the same way a symlink escape would
/// be: by never producing a path outside `root`.
pub fn safe_public_path(root: &Path, raw_path: &str) -> Option<PathBuf> {
    let decoded = percent_encoding::percent_decode_str(raw_path)
        .decode_utf8()
        .ok()?;

    let mut stack: Vec<&str> = Vec::new();
    for component in decoded.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }

    let mut resolved = root.to_path_buf();
    for segment in stack {
        resolved.push(segment);
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_resolves_inside_root() {
        let root = PathBuf::from("/srv/public");
        let resolved = safe_public_path(&root, "/app.js").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/public/app.js"));
    }

    #[test]
    fn nested_path_resolves_inside_root() {
        let root = PathBuf::from("/srv/public");
        let resolved = safe_public_path(&root, "/assets/img/logo.png").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/public/assets/img/logo.png"));
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let root = PathBuf::from("/srv/public");
        assert_eq!(safe_public_path(&root, "/../etc/hosts"), None);
    }

    #[test]
    fn deeply_nested_traversal_is_rejected() {
        let root = PathBuf::from("/srv/public");
        assert_eq!(safe_public_path(&root, "/a/../../etc/passwd"), None);
    }

    #[test]
    fn encoded_traversal_is_rejected() {
        let root = PathBuf::from("/srv/public");
        // "%2e%2e" decodes to "..".
        assert_eq!(safe_public_path(&root, "/%2e%2e/%2e%2e/etc/passwd"), None);
    }

    #[test]
    fn internal_dotdot_that_stays_inside_root_is_allowed() {
        let root = PathBuf::from("/srv/public");
        let resolved = safe_public_path(&root, "/assets/../app.js").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/public/app.js"));
    }

    #[tokio::test]
    async fn api_paths_are_rejected_with_exact_body() {
        use axum::body::to_bytes;
        use tower::ServiceExt;

        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path().to_path_buf());
        let request = axum::http::Request::builder()
            .uri("/api/anything")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, API_REJECTION_BODY.as_bytes());
    }

    #[tokio::test]
    async fn traversal_request_returns_400() {
        use tower::ServiceExt;

        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path().to_path_buf());
        let request = axum::http::Request::builder()
            .uri("/../etc/hosts")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_extensionless_path_falls_back_to_index() {
        use tower::ServiceExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>hi</html>").unwrap();
        let app = router(dir.path().to_path_buf());
        let request = axum::http::Request::builder()
            .uri("/dashboard")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_file_with_extension_is_404_not_index() {
        use tower::ServiceExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>hi</html>").unwrap();
        let app = router(dir.path().to_path_buf());
        let request = axum::http::Request::builder()
            .uri("/missing.png")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
