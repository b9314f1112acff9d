//! Atomic JSON read/write of the persisted selection, hotkey, and
//! insert-toggle. SettingsStore exclusively owns the on-disk file; every
//! write goes through a sibling temp file followed by a rename so the file
//! is never observed half-written, even across a crash.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recognized, persisted settings. Unknown keys round-trip through `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub selected_model_id: Option<String>,
    #[serde(default)]
    pub selected_model_path: Option<PathBuf>,
    #[serde(default)]
    pub dictation_trigger: Option<String>,
    #[serde(default)]
    pub focused_field_insert_enabled: bool,

    /// Any keys not recognized above, preserved verbatim across rewrites.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings from disk. An absent file yields an empty `Settings`.
    /// A malformed file fails with `ConfigCorrupt`; callers typically react
    /// by invoking [`SettingsStore::recover_from_corruption`].
    pub fn load(&self) -> EngineResult<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| EngineError::Other(format!("failed to read settings file: {e}")))?;
        if contents.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_json::from_str(&contents).map_err(|_| EngineError::ConfigCorrupt)
    }

    /// Write settings atomically: write to a sibling temp file, then rename
    /// over the destination. `rename` is atomic on the same filesystem, so a
    /// crash between the write and the rename leaves the old file intact; a
    /// crash after the rename leaves the new file intact. There is no
    /// observable partial state.
    pub fn save(&self, settings: &Settings) -> EngineResult<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| EngineError::Other(format!("failed to create settings dir: {e}")))?;
        }
        let contents = serde_json::to_string_pretty(settings)
            .map_err(|e| EngineError::Other(format!("failed to serialize settings: {e}")))?;

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, contents)
            .map_err(|e| EngineError::Other(format!("failed to write temp settings file: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| EngineError::Other(format!("failed to rename temp settings file: {e}")))?;
        Ok(())
    }

    /// Recover from a corrupt settings file: preserve it as `.bak` and
    /// rewrite an empty settings file in its place.
    pub fn recover_from_corruption(&self) -> EngineResult<Settings> {
        if self.path.exists() {
            let bak_path = self.path.with_extension("json.bak");
            let _ = std::fs::rename(&self.path, &bak_path);
        }
        let empty = Settings::default();
        self.save(&empty)?;
        Ok(empty)
    }

    /// Load settings, transparently recovering from corruption.
    pub fn load_or_recover(&self) -> EngineResult<Settings> {
        match self.load() {
            Ok(s) => Ok(s),
            Err(EngineError::ConfigCorrupt) => {
                tracing::warn!(
                    "settings file at {} was corrupt, preserving as .bak and resetting",
                    self.path.display()
                );
                self.recover_from_corruption()
            }
            Err(e) => Err(e),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| format!("{}.tmp", n.to_string_lossy()))
            .unwrap_or_else(|| "settings.tmp".to_string());
        self.path.with_file_name(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> SettingsStore {
        SettingsStore::new(dir.join("dictation-settings.json"))
    }

    #[test]
    fn load_missing_file_yields_empty_settings() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn save_then_load_round_trips_recognized_fields() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut s = Settings::default();
        s.selected_model_id = Some("base-en".into());
        s.dictation_trigger = Some("CmdOrCtrl+Shift+Space".into());
        s.focused_field_insert_enabled = true;
        store.save(&s).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn unknown_keys_survive_a_load_then_save_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dictation-settings.json");
        std::fs::write(
            &path,
            r#"{"selected_model_id": "base-en", "some_future_key": 42}"#,
        )
        .unwrap();

        let store = SettingsStore::new(path);
        let mut loaded = store.load().unwrap();
        assert_eq!(
            loaded.extra.get("some_future_key"),
            Some(&serde_json::json!(42))
        );

        loaded.focused_field_insert_enabled = true;
        store.save(&loaded).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(
            reloaded.extra.get("some_future_key"),
            Some(&serde_json::json!(42))
        );
        assert!(reloaded.focused_field_insert_enabled);
    }

    #[test]
    fn malformed_file_is_reported_as_config_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dictation-settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::new(path);
        assert!(matches!(store.load(), Err(EngineError::ConfigCorrupt)));
    }

    #[test]
    fn recover_from_corruption_preserves_bak_and_resets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dictation-settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::new(path.clone());

        let recovered = store.load_or_recover().unwrap();
        assert_eq!(recovered, Settings::default());
        assert!(path.with_extension("json.bak").exists());
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn empty_file_is_treated_as_empty_settings_not_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dictation-settings.json");
        std::fs::write(&path, "").unwrap();
        let store = SettingsStore::new(path);
        assert_eq!(store.load().unwrap(), Settings::default());
    }
}
