//! Focused-field insertion.
//!
//! Copies the transcript to the clipboard and synthesizes a paste keystroke
//! into whatever external field currently has focus. macOS drives the paste
//! through `osascript` rather than `enigo` directly: enigo's keyboard APIs
//! require the main thread on macOS and the coordinator calls this from a
//! worker thread.

use crate::hotkey::TextInserter;
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::debug;

const CLIPBOARD_SETTLE_MS: u64 = 10;

/// Pastes transcripts into the focused external field via the system
/// clipboard. Registered with [`HotkeyCoordinator`](crate::hotkey::HotkeyCoordinator)
/// when focused-field insertion is enabled.
pub struct ClipboardPasteInserter;

impl ClipboardPasteInserter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClipboardPasteInserter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextInserter for ClipboardPasteInserter {
    fn insert(&self, text: &str) -> Result<(), String> {
        if text.is_empty() {
            debug!("focused-field insertion skipped: empty transcript");
            return Ok(());
        }

        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| format!("failed to access clipboard: {e}"))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| format!("failed to set clipboard: {e}"))?;

        // Give the OS a moment to register the new clipboard contents before
        // the paste keystroke lands.
        thread::sleep(Duration::from_millis(CLIPBOARD_SETTLE_MS));

        #[cfg(target_os = "macos")]
        {
            paste_macos()
        }

        #[cfg(target_os = "linux")]
        {
            paste_linux()
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            Err("focused-field insertion is not supported on this platform".to_string())
        }
    }
}

#[cfg(target_os = "macos")]
fn paste_macos() -> Result<(), String> {
    let script = "tell application \"System Events\" to keystroke \"v\" using command down";
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .map_err(|e| format!("failed to execute AppleScript: {e}"))?;

    if output.status.success() {
        debug!("pasted transcript via AppleScript");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("AppleScript paste failed: {stderr}"))
    }
}

#[cfg(target_os = "linux")]
fn paste_linux() -> Result<(), String> {
    use enigo::{Direction, Enigo, Key, Keyboard, Settings};

    let mut enigo =
        Enigo::new(&Settings::default()).map_err(|e| format!("failed to initialise enigo: {e}"))?;

    enigo
        .key(Key::Control, Direction::Press)
        .map_err(|e| format!("failed to press Control: {e}"))?;
    enigo
        .key(Key::Unicode('v'), Direction::Click)
        .map_err(|e| format!("failed to press V: {e}"))?;
    enigo
        .key(Key::Control, Direction::Release)
        .map_err(|e| format!("failed to release Control: {e}"))?;

    debug!("pasted transcript via enigo");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcript_is_a_noop() {
        let inserter = ClipboardPasteInserter::new();
        assert!(inserter.insert("").is_ok());
    }
}
