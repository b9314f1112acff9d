//! Error taxonomy for the dictation engine.
//!
//! Every component reports failures through [`EngineError`] so the control
//! task can serialize a stable textual rendering into command return values
//! and into `state-changed(error)` events without leaking internal types to
//! the frontend.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("setup incomplete: {0}")]
    SetupIncomplete(String),

    #[error("dictation is already running")]
    AlreadyRunning,

    #[error("dictation is not running")]
    NotRunning,

    #[error("microphone could not be opened: {0}")]
    MicOpenFailed(String),

    #[error("no speech detected")]
    NoSpeech,

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("model download failed ({status}): {detail}")]
    DownloadFailed { status: String, detail: String },

    #[error("settings file was corrupt and has been reset")]
    ConfigCorrupt,

    #[error("invalid hotkey: {0}")]
    HotkeyInvalid(String),

    #[error("hotkey inactive on this platform: {0}")]
    HotkeyInactive(String),

    #[error("unknown model id: {0}")]
    UnknownModel(String),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Stable machine-readable tag, independent of the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::SetupIncomplete(_) => "SetupIncomplete",
            EngineError::AlreadyRunning => "AlreadyRunning",
            EngineError::NotRunning => "NotRunning",
            EngineError::MicOpenFailed(_) => "MicOpenFailed",
            EngineError::NoSpeech => "NoSpeech",
            EngineError::TranscriptionFailed(_) => "TranscriptionFailed",
            EngineError::DownloadFailed { .. } => "DownloadFailed",
            EngineError::ConfigCorrupt => "ConfigCorrupt",
            EngineError::HotkeyInvalid(_) => "HotkeyInvalid",
            EngineError::HotkeyInactive(_) => "HotkeyInactive",
            EngineError::UnknownModel(_) => "UnknownModel",
            EngineError::Other(_) => "Other",
        }
    }
}

/// Frontend-facing rendering: commands return `Result<T, String>` so Tauri's
/// IPC layer can serialize it without needing `serde` on the error type.
impl From<EngineError> for String {
    fn from(e: EngineError) -> String {
        e.to_string()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_text() {
        let e = EngineError::MicOpenFailed("timeout".into());
        assert_eq!(e.kind(), "MicOpenFailed");
        assert_eq!(e.to_string(), "microphone could not be opened: timeout");
    }

    #[test]
    fn download_failed_renders_status_and_detail() {
        let e = EngineError::DownloadFailed {
            status: "404".into(),
            detail: "not found".into(),
        };
        assert_eq!(e.to_string(), "model download failed (404): not found");
    }
}
