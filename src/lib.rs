//! dicktaint — local push-to-talk dictation engine.
//!
//! The engine is a value type composed of its constituent components; this
//! crate's `run()` wires one [`engine::Engine`] instance into a Tauri app
//! shell. There is no process-wide singleton — everything state-bearing
//! lives behind the managed `Engine`.

use std::sync::Arc;
use tauri::{Emitter, Listener, Manager};

pub mod audio;
pub mod boundary;
pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod hotkey;
pub mod models;
pub mod settings;
pub mod text_insert;
pub mod transcription;

use config::EngineConfig;
use engine::Engine;
use hotkey::CoordinatorEvent;

const MAIN_WINDOW_LABEL: &str = "main";

/// Forward coordinator events to the frontend and to the overlay windows.
/// Runs on its own thread for the lifetime of the app; the channel closes
/// (and the thread exits) only when the `Engine` is dropped.
fn spawn_event_forwarder(
    app: tauri::AppHandle,
    events_rx: crossbeam_channel::Receiver<CoordinatorEvent>,
) {
    std::thread::spawn(move || {
        for event in events_rx {
            match event {
                CoordinatorEvent::HotkeyTriggered => {
                    let _ = app.emit("dictation:hotkey-triggered", ());
                }
                CoordinatorEvent::StateChanged {
                    state,
                    error,
                    transcript,
                } => {
                    let _ = app.emit(
                        "dictation:state-changed",
                        serde_json::json!({
                            "state": state,
                            "error": error,
                            "transcript": transcript,
                        }),
                    );
                }
                CoordinatorEvent::PillStatus {
                    message,
                    state,
                    visible,
                } => {
                    let payload = serde_json::json!({
                        "message": message,
                        "state": state,
                        "visible": visible,
                    });
                    for window in app.webview_windows().values() {
                        if window.label().starts_with("overlay-pill-") {
                            let _ = window.emit("pill-status", payload.clone());
                        }
                    }
                    if let Some(overlays) = app.try_state::<parking_lot::Mutex<hotkey::overlay::OverlayManager>>() {
                        overlays.lock().show_all(&app, visible);
                    }
                }
            }
        }
    });
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tracing_subscriber::prelude::*;

    /// Format timestamps using the system's local time via chrono.
    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }

    let home_dir = EngineConfig::home_dir_or_fallback();
    let log_dir = home_dir.join(".dicktaint").join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("dicktaint-debug.log"))
        .ok();

    if let Some(file) = log_file {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_timer(LocalTimer)
            .with_ansi(false);
        let stdout_layer = tracing_subscriber::fmt::layer().with_timer(LocalTimer);
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with(stdout_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::fmt().with_timer(LocalTimer).init();
    }

    let config = EngineConfig::from_env(home_dir.clone(), home_dir.join(".dicktaint").join("public"));
    let start_hidden = config.start_hidden;
    let max_overlays = config.max_overlays;

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
                let _ = window.show();
                let _ = window.set_focus();
            }
        }))
        .plugin(tauri_plugin_autostart::init(
            tauri_plugin_autostart::MacosLauncher::LaunchAgent,
            Some(vec!["--autostarted"]),
        ))
        .setup(move |app| {
            tracing::info!("dicktaint starting");

            let app_handle = app.handle().clone();
            let host_handle = app_handle.clone();
            let host_foreground: Arc<dyn Fn() -> bool + Send + Sync> = Arc::new(move || {
                host_handle
                    .get_webview_window(MAIN_WINDOW_LABEL)
                    .and_then(|w| w.is_focused().ok())
                    .unwrap_or(false)
            });
            let inserter: Arc<dyn hotkey::TextInserter> = Arc::new(text_insert::ClipboardPasteInserter::new());

            let (engine, events_rx) = Engine::new(config.clone(), inserter, host_foreground);
            if let Err(e) = engine.rearm() {
                tracing::warn!("dictation not armed at startup: {e}");
            }
            app.manage(engine);

            spawn_event_forwarder(app_handle, events_rx);

            let mut overlays = hotkey::overlay::OverlayManager::new(max_overlays);
            overlays.prewarm(app.handle());
            app.manage(parking_lot::Mutex::new(overlays));

            if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
                if start_hidden {
                    let _ = window.hide();
                }

                let win = window.clone();
                window.on_window_event(move |event| {
                    if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                        api.prevent_close();
                        let _ = win.hide();
                    }
                });
            }

            #[cfg(target_os = "macos")]
            {
                app.set_activation_policy(tauri::ActivationPolicy::Accessory);

                let reopen_handle = app.handle().clone();
                app.listen("tauri://reopen", move |_event| {
                    if let Some(window) = reopen_handle.get_webview_window(MAIN_WINDOW_LABEL) {
                        let _ = window.show();
                        let _ = window.set_focus();
                    }
                });
            }

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_dictation_onboarding,
            commands::install_dictation_model,
            commands::delete_dictation_model,
            commands::start_native_dictation,
            commands::stop_native_dictation,
            commands::cancel_native_dictation,
            commands::open_whisper_setup_page,
            commands::get_dictation_trigger,
            commands::set_dictation_trigger,
            commands::clear_dictation_trigger,
            commands::set_focused_field_insert_enabled,
            commands::insert_text_into_focused_field,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
