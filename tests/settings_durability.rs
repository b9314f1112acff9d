//! Crash-simulated settings writes: a write interrupted between the temp
//! file and the rename must never leave the settings file partially written.

use dicktaint_lib::settings::{Settings, SettingsStore};
use std::path::Path;

fn write_old_settings(path: &Path, model_id: &str) {
    let store = SettingsStore::new(path.to_path_buf());
    let mut s = Settings::default();
    s.selected_model_id = Some(model_id.to_string());
    store.save(&s).unwrap();
}

#[test]
fn crash_between_temp_write_and_rename_preserves_old_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dictation-settings.json");
    write_old_settings(&path, "base-en");

    // Simulate the crash: the temp file for the *next* write lands on disk,
    // but the rename that would make it visible never happens.
    let tmp_path = path.with_file_name("dictation-settings.json.tmp");
    std::fs::write(&tmp_path, r#"{"selected_model_id": "large-v3""#).unwrap(); // truncated, invalid JSON

    let store = SettingsStore::new(path.clone());
    let loaded = store.load().unwrap();
    assert_eq!(loaded.selected_model_id.as_deref(), Some("base-en"));
}

#[test]
fn completed_rename_makes_new_content_visible_and_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dictation-settings.json");
    write_old_settings(&path, "base-en");

    let store = SettingsStore::new(path.clone());
    let mut updated = store.load().unwrap();
    updated.selected_model_id = Some("large-v3".to_string());
    store.save(&updated).unwrap();

    assert_eq!(
        store.load().unwrap().selected_model_id.as_deref(),
        Some("large-v3")
    );
    assert!(!path.with_file_name("dictation-settings.json.tmp").exists());
}
