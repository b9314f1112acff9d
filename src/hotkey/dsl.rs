//! Hotkey binding DSL: `Mod+Mod+...+Key`.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    CmdOrCtrl,
    Cmd,
    Ctrl,
    Alt,
    Shift,
    Super,
}

impl Modifier {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "cmdorctrl" | "commandorcontrol" => Some(Self::CmdOrCtrl),
            "cmd" | "command" | "meta" => Some(Self::Cmd),
            "ctrl" | "control" => Some(Self::Ctrl),
            "alt" | "option" => Some(Self::Alt),
            "shift" => Some(Self::Shift),
            "super" | "win" | "windows" => Some(Self::Super),
            _ => None,
        }
    }

    /// Canonical display order: `CmdOrCtrl, Cmd, Ctrl, Alt, Shift, Super`.
    fn order(self) -> u8 {
        match self {
            Self::CmdOrCtrl => 0,
            Self::Cmd => 1,
            Self::Ctrl => 2,
            Self::Alt => 3,
            Self::Shift => 4,
            Self::Super => 5,
        }
    }

    fn display(self) -> &'static str {
        match self {
            Self::CmdOrCtrl => "CmdOrCtrl",
            Self::Cmd => "Cmd",
            Self::Ctrl => "Ctrl",
            Self::Alt => "Alt",
            Self::Shift => "Shift",
            Self::Super => "Super",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Letter(char),
    Digit(char),
    Function(u8),
    Space,
    Tab,
    Enter,
    Escape,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Backspace,
    /// Standalone modifier key (must appear without modifiers, macOS only
    /// arms the listener; inactive on non-macOS hosts).
    Fn,
}

impl Key {
    fn from_token(token: &str) -> Option<Self> {
        let lower = token.to_ascii_lowercase();
        if lower.len() == 1 {
            let c = lower.chars().next().unwrap();
            if c.is_ascii_alphabetic() {
                return Some(Self::Letter(c.to_ascii_uppercase()));
            }
            if c.is_ascii_digit() {
                return Some(Self::Digit(c));
            }
        }
        if let Some(stripped) = lower.strip_prefix('f') {
            if let Ok(n) = stripped.parse::<u8>() {
                if (1..=24).contains(&n) {
                    return Some(Self::Function(n));
                }
            }
        }
        match lower.as_str() {
            "space" => Some(Self::Space),
            "tab" => Some(Self::Tab),
            "enter" | "return" => Some(Self::Enter),
            "escape" | "esc" => Some(Self::Escape),
            "up" | "arrowup" => Some(Self::ArrowUp),
            "down" | "arrowdown" => Some(Self::ArrowDown),
            "left" | "arrowleft" => Some(Self::ArrowLeft),
            "right" | "arrowright" => Some(Self::ArrowRight),
            "home" => Some(Self::Home),
            "end" => Some(Self::End),
            "pageup" => Some(Self::PageUp),
            "pagedown" => Some(Self::PageDown),
            "insert" => Some(Self::Insert),
            "delete" | "del" => Some(Self::Delete),
            "backspace" => Some(Self::Backspace),
            "fn" => Some(Self::Fn),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Letter(c) => write!(f, "{c}"),
            Self::Digit(c) => write!(f, "{c}"),
            Self::Function(n) => write!(f, "F{n}"),
            Self::Space => write!(f, "Space"),
            Self::Tab => write!(f, "Tab"),
            Self::Enter => write!(f, "Enter"),
            Self::Escape => write!(f, "Escape"),
            Self::ArrowUp => write!(f, "Up"),
            Self::ArrowDown => write!(f, "Down"),
            Self::ArrowLeft => write!(f, "Left"),
            Self::ArrowRight => write!(f, "Right"),
            Self::Home => write!(f, "Home"),
            Self::End => write!(f, "End"),
            Self::PageUp => write!(f, "PageUp"),
            Self::PageDown => write!(f, "PageDown"),
            Self::Insert => write!(f, "Insert"),
            Self::Delete => write!(f, "Delete"),
            Self::Backspace => write!(f, "Backspace"),
            Self::Fn => write!(f, "Fn"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HotkeyBinding {
    pub modifiers: Vec<Modifier>,
    pub key: Key,
}

impl HotkeyBinding {
    /// Parse a binding string. Fails on empty tokens, multiple main
    /// keys, `CmdOrCtrl` combined with `Cmd`/`Ctrl`, or `Fn` combined with
    /// any modifier.
    pub fn parse(s: &str) -> EngineResult<Self> {
        let tokens: Vec<&str> = s.split('+').map(str::trim).collect();
        if tokens.iter().any(|t| t.is_empty()) {
            return Err(EngineError::HotkeyInvalid(format!(
                "empty token in binding: {s}"
            )));
        }

        let mut modifiers = Vec::new();
        let mut key: Option<Key> = None;

        for token in &tokens {
            if let Some(m) = Modifier::from_token(token) {
                modifiers.push(m);
            } else if let Some(k) = Key::from_token(token) {
                if key.is_some() {
                    return Err(EngineError::HotkeyInvalid(format!(
                        "multiple main keys in binding: {s}"
                    )));
                }
                key = Some(k);
            } else {
                return Err(EngineError::HotkeyInvalid(format!(
                    "unrecognized token '{token}' in binding: {s}"
                )));
            }
        }

        let key = key.ok_or_else(|| EngineError::HotkeyInvalid(format!("no key in binding: {s}")))?;

        if key == Key::Fn && !modifiers.is_empty() {
            return Err(EngineError::HotkeyInvalid(
                "Fn must stand alone, without modifiers".into(),
            ));
        }

        let has_cmdorctrl = modifiers.contains(&Modifier::CmdOrCtrl);
        let has_cmd_or_ctrl = modifiers.iter().any(|m| matches!(m, Modifier::Cmd | Modifier::Ctrl));
        if has_cmdorctrl && has_cmd_or_ctrl {
            return Err(EngineError::HotkeyInvalid(
                "CmdOrCtrl cannot be combined with Cmd or Ctrl".into(),
            ));
        }

        modifiers.sort_by_key(|m| m.order());
        modifiers.dedup();

        Ok(Self { modifiers, key })
    }

    pub fn is_fn(&self) -> bool {
        self.key == Key::Fn
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.modifiers.iter().map(|m| m.display().to_string()).collect();
        parts.push(self.key.to_string());
        write!(f, "{}", parts.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_function_key() {
        let b = HotkeyBinding::parse("F13").unwrap();
        assert!(b.modifiers.is_empty());
        assert_eq!(b.key, Key::Function(13));
    }

    #[test]
    fn parses_modifier_combo_in_canonical_order() {
        let b = HotkeyBinding::parse("Shift+Alt+Space").unwrap();
        assert_eq!(b.to_string(), "Alt+Shift+Space");
    }

    #[test]
    fn parse_display_round_trips() {
        let original = "CmdOrCtrl+Shift+A";
        let b = HotkeyBinding::parse(original).unwrap();
        let displayed = b.to_string();
        let reparsed = HotkeyBinding::parse(&displayed).unwrap();
        assert_eq!(b, reparsed);
    }

    #[test]
    fn rejects_empty_token() {
        assert!(HotkeyBinding::parse("Shift++A").is_err());
    }

    #[test]
    fn rejects_multiple_main_keys() {
        assert!(HotkeyBinding::parse("A+B").is_err());
    }

    #[test]
    fn rejects_cmdorctrl_with_cmd() {
        assert!(HotkeyBinding::parse("CmdOrCtrl+Cmd+A").is_err());
    }

    #[test]
    fn rejects_cmdorctrl_with_ctrl() {
        assert!(HotkeyBinding::parse("CmdOrCtrl+Ctrl+A").is_err());
    }

    #[test]
    fn rejects_fn_combined_with_modifier() {
        assert!(HotkeyBinding::parse("Shift+Fn").is_err());
    }

    #[test]
    fn accepts_standalone_fn() {
        let b = HotkeyBinding::parse("Fn").unwrap();
        assert!(b.is_fn());
    }

    #[test]
    fn case_insensitive_aliases_accepted() {
        let b = HotkeyBinding::parse("commandorcontrol+shift+space").unwrap();
        assert_eq!(b.modifiers, vec![Modifier::CmdOrCtrl, Modifier::Shift]);
        assert_eq!(b.key, Key::Space);
    }
}
