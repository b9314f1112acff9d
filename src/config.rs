//! Engine configuration.
//!
//! The engine is a value type parameterized by [`EngineConfig`] rather than a
//! bundle of process-wide singletons: every path and tunable a component
//! needs is read from here, constructed once at startup and handed to each
//! component's constructor. There is no global config cache.

use std::path::PathBuf;

/// Environment variable that overrides the transcription CLI path.
pub const ENV_CLI_PATH_OVERRIDE: &str = "WHISPER_CLI_PATH";
/// Environment variable that overrides the model path, bypassing persisted selection.
pub const ENV_MODEL_PATH_OVERRIDE: &str = "WHISPER_MODEL_PATH";
/// Environment variable that starts the main window hidden.
pub const ENV_START_HIDDEN: &str = "DICKTAINT_START_HIDDEN";

const SETTINGS_DIR_NAME: &str = ".dicktaint";
const MODELS_DIR_NAME: &str = "whisper-models";
const SETTINGS_FILE_NAME: &str = "dictation-settings.json";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `<HOME>` directory used to derive the settings file and models dir.
    pub home_dir: PathBuf,
    /// Root directory the boundary static-file server serves from.
    pub public_dir: PathBuf,
    /// Explicit override for the transcription CLI path (probe step 1).
    pub cli_path_override: Option<PathBuf>,
    /// Explicit override for the model path, bypassing persisted selection.
    pub model_path_override: Option<PathBuf>,
    /// Whether the main window should start hidden.
    pub start_hidden: bool,
    /// Maximum number of per-monitor overlay windows to maintain.
    pub max_overlays: usize,
    /// Timeout for the mic-open handshake in `start`.
    pub mic_open_timeout_ms: u64,
}

impl EngineConfig {
    /// Build configuration from the environment, using the given directories
    /// as the defaults for anything not overridden.
    pub fn from_env(home_dir: PathBuf, public_dir: PathBuf) -> Self {
        let cli_path_override = std::env::var(ENV_CLI_PATH_OVERRIDE)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let model_path_override = std::env::var(ENV_MODEL_PATH_OVERRIDE)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let start_hidden = std::env::var(ENV_START_HIDDEN)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "on"))
            .unwrap_or(false);

        Self {
            home_dir,
            public_dir,
            cli_path_override,
            model_path_override,
            start_hidden,
            max_overlays: 6,
            mic_open_timeout_ms: 5_000,
        }
    }

    /// Resolve the default home directory, falling back to `/tmp` when the
    /// platform cannot report one.
    pub fn home_dir_or_fallback() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| {
            tracing::error!("could not determine home directory, using /tmp");
            PathBuf::from("/tmp")
        })
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.home_dir.join(SETTINGS_DIR_NAME)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.settings_dir().join(MODELS_DIR_NAME)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let home = Self::home_dir_or_fallback();
        let public = home.join(SETTINGS_DIR_NAME).join("public");
        Self::from_env(home, public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_settings_and_models_paths_under_home() {
        let cfg = EngineConfig::from_env(PathBuf::from("/home/u"), PathBuf::from("/pub"));
        assert_eq!(
            cfg.settings_path(),
            PathBuf::from("/home/u/.dicktaint/dictation-settings.json")
        );
        assert_eq!(
            cfg.models_dir(),
            PathBuf::from("/home/u/.dicktaint/whisper-models")
        );
    }

    #[test]
    fn max_overlays_defaults_to_six() {
        let cfg = EngineConfig::from_env(PathBuf::from("/home/u"), PathBuf::from("/pub"));
        assert_eq!(cfg.max_overlays, 6);
        assert_eq!(cfg.mic_open_timeout_ms, 5_000);
    }
}
