//! Global key monitor: edge-detect path for regular bindings.
//!
//! Polls system-wide keyboard state via `device_query` and reports down/up
//! transitions for the currently-armed binding's full combo.

use super::dsl::{HotkeyBinding, Key, Modifier};
use crossbeam_channel::{unbounded, Receiver, Sender};
use device_query::{DeviceQuery, DeviceState, Keycode};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL_MS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Down,
    Up,
}

/// Translate a DSL modifier to the device_query keycodes that satisfy it
/// (left/right variants are treated as equivalent).
fn modifier_keycodes(m: Modifier) -> &'static [Keycode] {
    match m {
        Modifier::CmdOrCtrl => {
            #[cfg(target_os = "macos")]
            {
                &[Keycode::LMeta, Keycode::RMeta]
            }
            #[cfg(not(target_os = "macos"))]
            {
                &[Keycode::LControl, Keycode::RControl]
            }
        }
        Modifier::Cmd | Modifier::Super => &[Keycode::LMeta, Keycode::RMeta],
        Modifier::Ctrl => &[Keycode::LControl, Keycode::RControl],
        Modifier::Alt => &[Keycode::LAlt, Keycode::RAlt],
        Modifier::Shift => &[Keycode::LShift, Keycode::RShift],
    }
}

/// Translate the DSL main key into its device_query keycode, when one
/// exists. Keys with no portable HID keycode (e.g. very high function-key
/// numbers on some platforms) return `None`.
fn key_keycode(key: &Key) -> Option<Keycode> {
    Some(match key {
        Key::Letter(c) => match c {
            'A' => Keycode::A,
            'B' => Keycode::B,
            'C' => Keycode::C,
            'D' => Keycode::D,
            'E' => Keycode::E,
            'F' => Keycode::F,
            'G' => Keycode::G,
            'H' => Keycode::H,
            'I' => Keycode::I,
            'J' => Keycode::J,
            'K' => Keycode::K,
            'L' => Keycode::L,
            'M' => Keycode::M,
            'N' => Keycode::N,
            'O' => Keycode::O,
            'P' => Keycode::P,
            'Q' => Keycode::Q,
            'R' => Keycode::R,
            'S' => Keycode::S,
            'T' => Keycode::T,
            'U' => Keycode::U,
            'V' => Keycode::V,
            'W' => Keycode::W,
            'X' => Keycode::X,
            'Y' => Keycode::Y,
            'Z' => Keycode::Z,
            _ => return None,
        },
        Key::Digit(c) => match c {
            '0' => Keycode::Key0,
            '1' => Keycode::Key1,
            '2' => Keycode::Key2,
            '3' => Keycode::Key3,
            '4' => Keycode::Key4,
            '5' => Keycode::Key5,
            '6' => Keycode::Key6,
            '7' => Keycode::Key7,
            '8' => Keycode::Key8,
            '9' => Keycode::Key9,
            _ => return None,
        },
        Key::Function(n) => match n {
            1 => Keycode::F1,
            2 => Keycode::F2,
            3 => Keycode::F3,
            4 => Keycode::F4,
            5 => Keycode::F5,
            6 => Keycode::F6,
            7 => Keycode::F7,
            8 => Keycode::F8,
            9 => Keycode::F9,
            10 => Keycode::F10,
            11 => Keycode::F11,
            12 => Keycode::F12,
            // F13+ are not part of device_query's portable keycode set on
            // every backend; unsupported numbers simply fail to arm.
            _ => return None,
        },
        Key::Space => Keycode::Space,
        Key::Tab => Keycode::Tab,
        Key::Enter => Keycode::Enter,
        Key::Escape => Keycode::Escape,
        Key::ArrowUp => Keycode::Up,
        Key::ArrowDown => Keycode::Down,
        Key::ArrowLeft => Keycode::Left,
        Key::ArrowRight => Keycode::Right,
        Key::Home => Keycode::Home,
        Key::End => Keycode::End,
        Key::PageUp => Keycode::PageUp,
        Key::PageDown => Keycode::PageDown,
        Key::Insert => Keycode::Insert,
        Key::Delete => Keycode::Delete,
        Key::Backspace => Keycode::Backspace,
        Key::Fn => return None,
    })
}

/// Returns `true` if the combo required by `binding` is currently satisfied
/// by the pressed-key set.
fn combo_pressed(binding: &HotkeyBinding, pressed: &HashSet<Keycode>, main: Keycode) -> bool {
    if !pressed.contains(&main) {
        return false;
    }
    binding
        .modifiers
        .iter()
        .all(|m| modifier_keycodes(*m).iter().any(|k| pressed.contains(k)))
}

pub struct GlobalKeyMonitor {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl GlobalKeyMonitor {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Arm the monitor for `binding`, returning a receiver of edge events.
    /// Returns `None` if the binding's main key has no portable keycode
    /// (e.g. `Fn`, or an unsupported function-key number).
    pub fn start(&mut self, binding: HotkeyBinding) -> Option<Receiver<Edge>> {
        self.stop();

        let main = key_keycode(&binding.key)?;
        let (tx, rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        let handle = thread::spawn(move || run_poll_loop(binding, main, tx, running));
        self.handle = Some(handle);
        Some(rx)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for GlobalKeyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GlobalKeyMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_poll_loop(binding: HotkeyBinding, main: Keycode, tx: Sender<Edge>, running: Arc<AtomicBool>) {
    let device_state = DeviceState::new();
    let mut was_down = false;

    while running.load(Ordering::SeqCst) {
        let pressed: HashSet<Keycode> = device_state.get_keys().into_iter().collect();
        let is_down = combo_pressed(&binding, &pressed, main);

        if is_down && !was_down {
            was_down = true;
            if tx.send(Edge::Down).is_err() {
                break;
            }
        } else if !is_down && was_down {
            was_down = false;
            if tx.send(Edge::Up).is_err() {
                break;
            }
        }

        thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_keycode_maps_letters_and_digits() {
        assert_eq!(key_keycode(&Key::Letter('A')), Some(Keycode::A));
        assert_eq!(key_keycode(&Key::Digit('5')), Some(Keycode::Key5));
    }

    #[test]
    fn key_keycode_rejects_fn() {
        assert_eq!(key_keycode(&Key::Fn), None);
    }

    #[test]
    fn key_keycode_rejects_unsupported_high_function_keys() {
        assert_eq!(key_keycode(&Key::Function(13)), None);
    }

    #[test]
    fn combo_pressed_requires_all_modifiers() {
        let binding = HotkeyBinding::parse("Shift+A").unwrap();
        let main = Keycode::A;
        let mut pressed = HashSet::new();
        pressed.insert(Keycode::A);
        assert!(!combo_pressed(&binding, &pressed, main));
        pressed.insert(Keycode::LShift);
        assert!(combo_pressed(&binding, &pressed, main));
    }
}
