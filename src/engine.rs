//! The dictation engine as a single value type: one [`Engine`] instance,
//! parameterized by [`EngineConfig`], owns every engine component. The
//! control task (the Tauri command handlers in [`crate::commands`]) holds it
//! behind `tauri::State` and is the only thing permitted to mutate it —
//! there is no process-wide singleton.

use crate::audio::CaptureEngine;
use crate::cli::{CliResolver, ResolvedCli};
use crate::config::EngineConfig;
use crate::device::{self, DeviceProfile};
use crate::error::{EngineError, EngineResult};
use crate::hotkey::{CoordinatorEvent, HotkeyBinding, HotkeyCoordinator, HotkeyService, TextInserter};
use crate::models::{self, ModelCatalog, ModelRuntimeState};
use crate::settings::{Settings, SettingsStore};
use crate::transcription::TranscriptionDriver;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Composite payload for `get_dictation_onboarding`: fans out to the device
/// profiler, settings store, model catalog, and CLI resolver, and returns a
/// single combined payload.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingPayload {
    pub device: DeviceProfile,
    pub cli_available: bool,
    pub models: Vec<ModelRuntimeState>,
    pub selected_model_id: Option<String>,
    pub dictation_trigger: Option<String>,
    pub focused_field_insert_enabled: bool,
}

pub struct Engine {
    config: EngineConfig,
    settings_store: SettingsStore,
    profile: DeviceProfile,
    capture: Arc<CaptureEngine>,
    transcription: Arc<TranscriptionDriver>,
    events_tx: Sender<CoordinatorEvent>,
    hotkey_service: Mutex<HotkeyService>,
    coordinator: Mutex<Option<Arc<HotkeyCoordinator>>>,
    inserter: Arc<dyn TextInserter>,
    host_foreground: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Engine {
    /// Build the engine and return the receiver side of its event channel;
    /// the caller (lib.rs `setup`) is responsible for forwarding those
    /// events to the frontend and the overlay windows.
    pub fn new(
        config: EngineConfig,
        inserter: Arc<dyn TextInserter>,
        host_foreground: Arc<dyn Fn() -> bool + Send + Sync>,
    ) -> (Self, Receiver<CoordinatorEvent>) {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let settings_store = SettingsStore::new(config.settings_path());
        let profile = device::profile();
        let mic_open_timeout = Duration::from_millis(config.mic_open_timeout_ms);

        let engine = Self {
            config,
            settings_store,
            profile,
            capture: Arc::new(CaptureEngine::new(mic_open_timeout)),
            transcription: Arc::new(TranscriptionDriver::new()),
            events_tx,
            hotkey_service: Mutex::new(HotkeyService::new()),
            coordinator: Mutex::new(None),
            inserter,
            host_foreground,
        };
        (engine, events_rx)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events_tx(&self) -> Sender<CoordinatorEvent> {
        self.events_tx.clone()
    }

    fn resolve_cli(&self) -> Option<ResolvedCli> {
        CliResolver::new(self.config.cli_path_override.clone()).resolve()
    }

    /// Device/settings/model-catalog/CLI-resolver fan-out.
    pub fn onboarding(&self) -> EngineResult<OnboardingPayload> {
        let settings = self.settings_store.load_or_recover()?;
        let models = ModelCatalog::evaluate(
            &self.profile,
            &self.config.models_dir(),
            settings.selected_model_id.as_deref(),
        );
        Ok(OnboardingPayload {
            device: self.profile.clone(),
            cli_available: self.resolve_cli().is_some(),
            models,
            selected_model_id: settings.selected_model_id,
            dictation_trigger: settings.dictation_trigger,
            focused_field_insert_enabled: settings.focused_field_insert_enabled,
        })
    }

    pub async fn install_model(&self, model_id: &str) -> EngineResult<Settings> {
        let settings = models::install_model(&self.config.models_dir(), &self.settings_store, model_id).await?;
        self.rearm_if_cli_available()?;
        Ok(settings)
    }

    pub fn delete_model(&self, model_id: &str) -> EngineResult<Settings> {
        let settings = models::delete_model(&self.config.models_dir(), &self.settings_store, &self.profile, model_id)?;
        self.rearm_if_cli_available()?;
        Ok(settings)
    }

    /// Rearm after a model selection changes. Missing CLI/model is expected
    /// before onboarding completes, so it is not surfaced as a command error.
    fn rearm_if_cli_available(&self) -> EngineResult<()> {
        match self.rearm() {
            Ok(()) | Err(EngineError::SetupIncomplete(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn get_trigger(&self) -> EngineResult<Option<String>> {
        Ok(self.settings_store.load_or_recover()?.dictation_trigger)
    }

    pub fn set_trigger(&self, trigger: &str) -> EngineResult<Settings> {
        // Validate without side effects before touching the persisted binding
        // A rejected binding must not clobber the current one.
        HotkeyBinding::parse(trigger)?;
        let mut settings = self.settings_store.load_or_recover()?;
        settings.dictation_trigger = Some(trigger.to_string());
        self.settings_store.save(&settings)?;
        Ok(settings)
    }

    pub fn clear_trigger(&self) -> EngineResult<Settings> {
        let mut settings = self.settings_store.load_or_recover()?;
        settings.dictation_trigger = None;
        self.settings_store.save(&settings)?;
        self.hotkey_service.lock().disarm();
        *self.coordinator.lock() = None;
        Ok(settings)
    }

    pub fn set_focused_field_insert_enabled(&self, enabled: bool) -> EngineResult<Settings> {
        let mut settings = self.settings_store.load_or_recover()?;
        settings.focused_field_insert_enabled = enabled;
        self.settings_store.save(&settings)?;
        if let Some(coordinator) = self.coordinator.lock().as_ref() {
            coordinator.set_focused_field_insert_enabled(enabled);
        }
        Ok(settings)
    }

    pub fn insert_text_into_focused_field(&self, text: &str) -> EngineResult<()> {
        self.inserter
            .insert(text)
            .map_err(EngineError::Other)
    }

    fn resolved_model_path(&self, settings: &Settings) -> EngineResult<std::path::PathBuf> {
        if let Some(p) = &self.config.model_path_override {
            return Ok(p.clone());
        }
        settings
            .selected_model_path
            .clone()
            .ok_or_else(|| EngineError::SetupIncomplete("no model selected".into()))
    }

    /// (Re)build the coordinator and arm the hotkey listener from the
    /// currently persisted trigger, model, and CLI. Called at startup and
    /// whenever the model selection or trigger changes.
    pub fn rearm(&self) -> EngineResult<()> {
        let settings = self.settings_store.load_or_recover()?;
        let model_path = match self.resolved_model_path(&settings) {
            Ok(p) => p,
            Err(e) => {
                self.hotkey_service.lock().disarm();
                *self.coordinator.lock() = None;
                return Err(e);
            }
        };
        let cli = match self.resolve_cli() {
            Some(c) => c,
            None => {
                self.hotkey_service.lock().disarm();
                *self.coordinator.lock() = None;
                return Err(EngineError::SetupIncomplete("no whisper-cli executable found".into()));
            }
        };

        let coordinator = Arc::new(HotkeyCoordinator::new(
            self.capture.clone(),
            self.transcription.clone(),
            cli,
            model_path,
            self.events_tx.clone(),
            Some(self.inserter.clone()),
            self.host_foreground.clone(),
        ));
        coordinator.set_focused_field_insert_enabled(settings.focused_field_insert_enabled);

        let mut service = self.hotkey_service.lock();
        service.disarm();
        if let Some(trigger) = &settings.dictation_trigger {
            let binding = HotkeyBinding::parse(trigger)?;
            service.arm(binding, coordinator.clone())?;
        }
        drop(service);

        *self.coordinator.lock() = Some(coordinator);
        Ok(())
    }

    fn coordinator(&self) -> EngineResult<Arc<HotkeyCoordinator>> {
        self.coordinator
            .lock()
            .clone()
            .ok_or_else(|| EngineError::SetupIncomplete("dictation has not been armed yet".into()))
    }

    pub fn start_native(&self) -> EngineResult<()> {
        self.coordinator()?.manual_start()
    }

    pub fn stop_native(&self) -> EngineResult<String> {
        self.coordinator()?.manual_stop()
    }

    pub fn cancel_native(&self) {
        if let Some(c) = self.coordinator.lock().as_ref() {
            c.cancel();
        }
        self.capture.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct NoopInserter;
    impl TextInserter for NoopInserter {
        fn insert(&self, _text: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn test_engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::from_env(dir.path().to_path_buf(), dir.path().join("public"));
        let (engine, _rx) = Engine::new(config, Arc::new(NoopInserter), Arc::new(|| false));
        (engine, dir)
    }

    #[test]
    fn onboarding_reports_no_selection_by_default() {
        let (engine, _dir) = test_engine();
        let payload = engine.onboarding().unwrap();
        assert_eq!(payload.selected_model_id, None);
        assert_eq!(payload.models.len(), crate::models::CATALOG.len());
    }

    #[test]
    fn set_trigger_rejects_invalid_dsl_without_clobbering_settings() {
        let (engine, _dir) = test_engine();
        engine.set_trigger("CmdOrCtrl+Shift+Space").unwrap();
        assert!(engine.set_trigger("Shift+Fn").is_err());
        assert_eq!(
            engine.get_trigger().unwrap().as_deref(),
            Some("CmdOrCtrl+Shift+Space")
        );
    }

    #[test]
    fn rearm_without_a_selected_model_is_setup_incomplete() {
        let (engine, _dir) = test_engine();
        assert!(matches!(engine.rearm(), Err(EngineError::SetupIncomplete(_))));
    }

    #[test]
    fn start_native_before_rearm_is_setup_incomplete() {
        let (engine, _dir) = test_engine();
        assert!(matches!(engine.start_native(), Err(EngineError::SetupIncomplete(_))));
    }

    #[test]
    fn model_path_override_bypasses_persisted_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::from_env(dir.path().to_path_buf(), dir.path().join("public"));
        config.model_path_override = Some(PathBuf::from("/override/model.bin"));
        let (engine, _rx) = Engine::new(config, Arc::new(NoopInserter), Arc::new(|| false));
        let settings = Settings::default();
        assert_eq!(
            engine.resolved_model_path(&settings).unwrap(),
            PathBuf::from("/override/model.bin")
        );
    }
}
