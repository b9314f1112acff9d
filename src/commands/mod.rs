//! Tauri command handlers — the dictation engine's command surface.
//!
//! Every command is a thin delegation into [`crate::engine::Engine`], held
//! as managed state; this module owns no state of its own.

use crate::engine::{Engine, OnboardingPayload};
use crate::settings::Settings;
use tauri::State;

const WHISPER_SETUP_URL: &str = "https://github.com/ggerganov/whisper.cpp#quick-start";

#[tauri::command]
pub fn get_dictation_onboarding(engine: State<'_, Engine>) -> Result<OnboardingPayload, String> {
    engine.onboarding().map_err(Into::into)
}

#[tauri::command]
pub async fn install_dictation_model(
    engine: State<'_, Engine>,
    model: String,
) -> Result<Settings, String> {
    engine.install_model(&model).await.map_err(Into::into)
}

#[tauri::command]
pub fn delete_dictation_model(engine: State<'_, Engine>, model: String) -> Result<Settings, String> {
    engine.delete_model(&model).map_err(Into::into)
}

#[tauri::command]
pub fn start_native_dictation(engine: State<'_, Engine>) -> Result<(), String> {
    engine.start_native().map_err(Into::into)
}

#[tauri::command]
pub fn stop_native_dictation(engine: State<'_, Engine>) -> Result<String, String> {
    engine.stop_native().map_err(Into::into)
}

#[tauri::command]
pub fn cancel_native_dictation(engine: State<'_, Engine>) {
    engine.cancel_native();
}

/// Points the user at the upstream build/install instructions for the
/// transcription CLI; does not download or build anything itself.
#[tauri::command]
pub fn open_whisper_setup_page() -> Result<(), String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(WHISPER_SETUP_URL)
            .spawn()
            .map_err(|e| format!("failed to open setup page: {e}"))?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(WHISPER_SETUP_URL)
            .spawn()
            .map_err(|e| format!("failed to open setup page: {e}"))?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", "", WHISPER_SETUP_URL])
            .spawn()
            .map_err(|e| format!("failed to open setup page: {e}"))?;
    }

    Ok(())
}

#[tauri::command]
pub fn get_dictation_trigger(engine: State<'_, Engine>) -> Result<Option<String>, String> {
    engine.get_trigger().map_err(Into::into)
}

#[tauri::command]
pub fn set_dictation_trigger(engine: State<'_, Engine>, trigger: String) -> Result<Settings, String> {
    let settings = engine.set_trigger(&trigger).map_err(Into::<String>::into)?;
    if let Err(e) = engine.rearm() {
        tracing::warn!("set_dictation_trigger saved but rearm failed: {e}");
    }
    Ok(settings)
}

#[tauri::command]
pub fn clear_dictation_trigger(engine: State<'_, Engine>) -> Result<Settings, String> {
    engine.clear_trigger().map_err(Into::into)
}

#[tauri::command]
pub fn set_focused_field_insert_enabled(
    engine: State<'_, Engine>,
    enabled: bool,
) -> Result<Settings, String> {
    engine.set_focused_field_insert_enabled(enabled).map_err(Into::into)
}

#[tauri::command]
pub fn insert_text_into_focused_field(engine: State<'_, Engine>, text: String) -> Result<(), String> {
    engine.insert_text_into_focused_field(&text).map_err(Into::into)
}
