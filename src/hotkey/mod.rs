//! Hotkey DSL, global edge-detect monitor (with macOS `Fn` specialization),
//! coordinator state machine, and overlay windows.

pub mod coordinator;
pub mod dsl;
pub mod fn_monitor;
pub mod monitor;
pub mod overlay;

pub use coordinator::{CoordinatorEvent, DictationState, HotkeyCoordinator, PillState, TextInserter};
pub use dsl::HotkeyBinding;
pub use monitor::{Edge, GlobalKeyMonitor};

use crate::error::{EngineError, EngineResult};
use std::sync::Arc;

/// Owns whichever listener (edge-detect or Fn) is armed for the current
/// binding and forwards its edges into the coordinator.
pub struct HotkeyService {
    key_monitor: GlobalKeyMonitor,
    fn_monitor: fn_monitor::FnMonitor,
    active: Option<HotkeyBinding>,
}

impl HotkeyService {
    pub fn new() -> Self {
        Self {
            key_monitor: GlobalKeyMonitor::new(),
            fn_monitor: fn_monitor::FnMonitor::new(),
            active: None,
        }
    }

    /// Arm the listener for `binding`, forwarding edges to `coordinator`.
    /// Returns [`EngineError::HotkeyInactive`] when the binding is `Fn` on a
    /// non-macOS host, or when the binding otherwise cannot be armed.
    pub fn arm(&mut self, binding: HotkeyBinding, coordinator: Arc<HotkeyCoordinator>) -> EngineResult<()> {
        self.disarm();

        if binding.is_fn() {
            if !fn_monitor::fn_monitoring_supported() {
                self.active = Some(binding);
                return Err(EngineError::HotkeyInactive("fn-requires-macos".into()));
            }
            let rx = self
                .fn_monitor
                .start()
                .ok_or_else(|| EngineError::HotkeyInactive("fn-event-tap-unavailable".into()))?;
            self.active = Some(binding);
            std::thread::spawn(move || {
                for pressed in rx {
                    let edge = if pressed { Edge::Down } else { Edge::Up };
                    coordinator.on_edge(edge);
                }
            });
            return Ok(());
        }

        let rx = self
            .key_monitor
            .start(binding.clone())
            .ok_or_else(|| EngineError::HotkeyInvalid("key has no supported keycode".into()))?;
        self.active = Some(binding);
        std::thread::spawn(move || {
            for edge in rx {
                coordinator.on_edge(edge);
            }
        });
        Ok(())
    }

    pub fn disarm(&mut self) {
        self.key_monitor.stop();
        self.fn_monitor.stop();
        self.active = None;
    }

    pub fn active_binding(&self) -> Option<&HotkeyBinding> {
        self.active.as_ref()
    }
}

impl Default for HotkeyService {
    fn default() -> Self {
        Self::new()
    }
}
