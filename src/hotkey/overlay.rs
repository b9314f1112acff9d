//! Per-monitor pill overlay windows.
//!
//! Each overlay is a pre-built `WebviewWindow` labeled `overlay-pill-<n>`,
//! shown once off-screen during `.setup()` so the webview is warm, then
//! repositioned onto its target monitor whenever it needs to be visible.
//! "Hidden" means moved far off-screen rather than `window.hide()`, to dodge
//! platform show/hide animation latency.

use tauri::{AppHandle, LogicalPosition, LogicalSize, Manager, WebviewUrl, WebviewWindowBuilder};

const LABEL_PREFIX: &str = "overlay-pill-";
const OFFSCREEN_X: f64 = -10_000.0;
const OFFSCREEN_Y: f64 = -10_000.0;
const PILL_WIDTH: f64 = 220.0;
const PILL_HEIGHT: f64 = 56.0;
const BOTTOM_MARGIN: f64 = 48.0;

struct OverlayRecord {
    monitor_id: u32,
}

/// Owns the set of overlay windows, keyed by monitor, capped at
/// `max_overlays`. Re-enumerated on monitor plug/unplug.
pub struct OverlayManager {
    max_overlays: usize,
    records: Vec<OverlayRecord>,
}

impl OverlayManager {
    pub fn new(max_overlays: usize) -> Self {
        Self {
            max_overlays,
            records: Vec::new(),
        }
    }

    /// Pre-warm one overlay window per currently-known monitor, up to the
    /// cap. Called once during `.setup()`.
    pub fn prewarm(&mut self, app: &AppHandle) {
        let monitors = match app
            .get_webview_window("main")
            .and_then(|w| w.available_monitors().ok())
        {
            Some(m) => m,
            None => return,
        };

        for (i, _monitor) in monitors.iter().take(self.max_overlays).enumerate() {
            if self.records.iter().any(|r| r.monitor_id == i as u32) {
                continue;
            }
            let label = format!("{LABEL_PREFIX}{i}");
            let builder = WebviewWindowBuilder::new(app, &label, WebviewUrl::App("overlay.html".into()))
                .title("")
                .inner_size(PILL_WIDTH, PILL_HEIGHT)
                .position(OFFSCREEN_X, OFFSCREEN_Y)
                .transparent(true)
                .decorations(false)
                .always_on_top(true)
                .skip_taskbar(true)
                .shadow(false)
                .resizable(false)
                .visible(true);

            match builder.build() {
                Ok(window) => {
                    let _ = window.set_ignore_cursor_events(true);
                    self.records.push(OverlayRecord { monitor_id: i as u32 });
                }
                Err(e) => {
                    tracing::warn!("failed to pre-warm overlay window {label}: {e}");
                }
            }
        }
    }

    /// Re-enumerate monitors (plug/unplug): drop records for monitors that
    /// disappeared (moving their window off-screen), create fresh records
    /// for new monitors up to the cap.
    pub fn reconcile_monitors(&mut self, app: &AppHandle) {
        let monitor_count = app
            .get_webview_window("main")
            .and_then(|w| w.available_monitors().ok())
            .map(|m| m.len())
            .unwrap_or(0)
            .min(self.max_overlays);

        self.records.retain(|r| {
            let keep = (r.monitor_id as usize) < monitor_count;
            if !keep {
                if let Some(window) = app.get_webview_window(&format!("{LABEL_PREFIX}{}", r.monitor_id)) {
                    let _ = window.set_position(tauri::Position::Logical(LogicalPosition::new(
                        OFFSCREEN_X,
                        OFFSCREEN_Y,
                    )));
                }
            }
            keep
        });

        self.prewarm(app);
    }

    /// Move every overlay onto its monitor's bottom-center and show the
    /// current pill state. `visible = false` moves every overlay off-screen
    /// instead.
    pub fn show_all(&self, app: &AppHandle, visible: bool) {
        let Some(monitors) = app
            .get_webview_window("main")
            .and_then(|w| w.available_monitors().ok())
        else {
            return;
        };

        for record in &self.records {
            let Some(window) = app.get_webview_window(&format!("{LABEL_PREFIX}{}", record.monitor_id))
            else {
                continue;
            };

            if !visible {
                let _ = window.set_position(tauri::Position::Logical(LogicalPosition::new(
                    OFFSCREEN_X,
                    OFFSCREEN_Y,
                )));
                continue;
            }

            let Some(monitor) = monitors.get(record.monitor_id as usize) else {
                continue;
            };
            let scale = monitor.scale_factor();
            let pos = monitor.position();
            let size = monitor.size();
            let mon_x = pos.x as f64 / scale;
            let mon_y = pos.y as f64 / scale;
            let mon_w = size.width as f64 / scale;
            let mon_h = size.height as f64 / scale;

            let x = mon_x + (mon_w / 2.0) - (PILL_WIDTH / 2.0);
            let y = mon_y + mon_h - PILL_HEIGHT - BOTTOM_MARGIN;

            let _ = window.set_size(tauri::Size::Logical(LogicalSize::new(PILL_WIDTH, PILL_HEIGHT)));
            let _ = window.set_position(tauri::Position::Logical(LogicalPosition::new(x, y)));
        }
    }

    pub fn overlay_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_no_overlays() {
        let manager = OverlayManager::new(6);
        assert_eq!(manager.overlay_count(), 0);
    }
}
