//! Keyboard state and key naming
//!
//! Backends report physical keycodes in evdev numbering (Wayland keycodes
//! as-is, X11 keycodes minus 8, Win32 scan codes). The value passed to the
//! keyboard callback is the produced text, or a unified name for keys that
//! produce none.

use log::debug;

use crate::event::WindowId;

/// Tracks pressed keys to filter out auto-repeat
#[derive(Debug)]
pub struct KeyTracker {
    /// Window with keyboard focus
    focus: Option<WindowId>,
    /// Currently pressed keys (keycodes)
    pressed_keys: Vec<u32>,
}

impl KeyTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self {
            focus: None,
            pressed_keys: Vec::new(),
        }
    }

    /// Set keyboard focus; pressed keys are forgotten when focus moves
    pub fn set_focus(&mut self, window: Option<WindowId>) -> Option<WindowId> {
        let old_focus = self.focus;
        if old_focus != window {
            self.pressed_keys.clear();
        }
        self.focus = window;
        old_focus
    }

    /// Get the focused window
    pub fn focus(&self) -> Option<WindowId> {
        self.focus
    }

    /// Handle a key press; `false` for an auto-repeat
    pub fn press(&mut self, keycode: u32) -> bool {
        if !self.pressed_keys.contains(&keycode) {
            self.pressed_keys.push(keycode);
            debug!("Key pressed: {}", keycode);
            true
        } else {
            false
        }
    }

    /// Handle a key release; `false` if the key was not pressed
    pub fn release(&mut self, keycode: u32) -> bool {
        if let Some(idx) = self.pressed_keys.iter().position(|&k| k == keycode) {
            self.pressed_keys.remove(idx);
            debug!("Key released: {}", keycode);
            true
        } else {
            false
        }
    }

    /// Forget all pressed keys
    pub fn clear(&mut self) {
        self.pressed_keys.clear();
    }

    /// Get currently pressed keys
    pub fn pressed_keys(&self) -> &[u32] {
        &self.pressed_keys
    }
}

impl Default for KeyTracker {
    fn default() -> Self {
        Self::new()
    }
}

const FUNCTION_KEYS: [&str; 12] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];

/// Unified name of a non-printing X keysym
pub fn named_key(keysym: u32) -> Option<&'static str> {
    let name = match keysym {
        0xff1b => "Escape",
        0xff08 => "Backspace",
        0xff0d | 0xff8d => "Enter",
        0xff09 | 0xfe20 => "Tab",
        0xffff | 0xff9f => "Delete",
        0xff63 | 0xff9e => "Insert",
        0xff50 | 0xff95 => "Home",
        0xff57 | 0xff9c => "End",
        0xff55 | 0xff9a => "PageUp",
        0xff56 | 0xff9b => "PageDown",
        0xff51 | 0xff96 => "ArrowLeft",
        0xff52 | 0xff97 => "ArrowUp",
        0xff53 | 0xff98 => "ArrowRight",
        0xff54 | 0xff99 => "ArrowDown",
        0xffbe..=0xffc9 => FUNCTION_KEYS[(keysym - 0xffbe) as usize],
        _ => return None,
    };
    Some(name)
}

/// Unified name of a non-printing Win32 virtual key
pub fn named_virtual_key(vk: u32) -> Option<&'static str> {
    let name = match vk {
        0x1b => "Escape",
        0x08 => "Backspace",
        0x0d => "Enter",
        0x09 => "Tab",
        0x2e => "Delete",
        0x2d => "Insert",
        0x24 => "Home",
        0x23 => "End",
        0x21 => "PageUp",
        0x22 => "PageDown",
        0x25 => "ArrowLeft",
        0x26 => "ArrowUp",
        0x27 => "ArrowRight",
        0x28 => "ArrowDown",
        0x70..=0x7b => FUNCTION_KEYS[(vk - 0x70) as usize],
        _ => return None,
    };
    Some(name)
}

/// Evdev keycode for a PC/AT set 1 scan code
///
/// Non-extended codes coincide with evdev; `E0`-prefixed keys are remapped.
pub fn evdev_from_scan_code(scan_code: u32, extended: bool) -> u32 {
    if !extended {
        return scan_code;
    }
    match scan_code {
        0x1c => 96,  // KEY_KPENTER
        0x1d => 97,  // KEY_RIGHTCTRL
        0x35 => 98,  // KEY_KPSLASH
        0x37 => 99,  // KEY_SYSRQ
        0x38 => 100, // KEY_RIGHTALT
        0x47 => 102, // KEY_HOME
        0x48 => 103, // KEY_UP
        0x49 => 104, // KEY_PAGEUP
        0x4b => 105, // KEY_LEFT
        0x4d => 106, // KEY_RIGHT
        0x4f => 107, // KEY_END
        0x50 => 108, // KEY_DOWN
        0x51 => 109, // KEY_PAGEDOWN
        0x52 => 110, // KEY_INSERT
        0x53 => 111, // KEY_DELETE
        0x5b => 125, // KEY_LEFTMETA
        0x5c => 126, // KEY_RIGHTMETA
        0x5d => 127, // KEY_COMPOSE
        other => other,
    }
}

/// Value reported to the keyboard callback
///
/// A unified name wins, then printable text, then the backend's own name
/// for the key.
pub fn key_value(text: &str, named: Option<&str>, fallback: &str) -> String {
    if let Some(name) = named {
        return name.to_string();
    }
    if !text.is_empty() && !text.chars().any(char::is_control) {
        return text.to_string();
    }
    fallback.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_release() {
        let mut keys = KeyTracker::new();

        assert!(keys.press(30));
        assert!(keys.pressed_keys().contains(&30));

        // Auto-repeat of a held key
        assert!(!keys.press(30));

        assert!(keys.release(30));
        assert!(!keys.pressed_keys().contains(&30));
        assert!(!keys.release(30));
    }

    #[test]
    fn test_focus_change_clears_keys() {
        let mut keys = KeyTracker::new();
        assert_eq!(keys.set_focus(Some(WindowId(1))), None);
        keys.press(30);

        assert_eq!(keys.set_focus(Some(WindowId(1))), Some(WindowId(1)));
        assert_eq!(keys.pressed_keys(), &[30]);

        assert_eq!(keys.set_focus(Some(WindowId(2))), Some(WindowId(1)));
        assert!(keys.pressed_keys().is_empty());
        assert_eq!(keys.focus(), Some(WindowId(2)));
    }

    #[test]
    fn test_named_keysyms() {
        assert_eq!(named_key(0xff1b), Some("Escape"));
        assert_eq!(named_key(0xff0d), Some("Enter"));
        assert_eq!(named_key(0xff8d), Some("Enter"));
        assert_eq!(named_key(0xff51), Some("ArrowLeft"));
        assert_eq!(named_key(0xff56), Some("PageDown"));
        assert_eq!(named_key(0xffbe), Some("F1"));
        assert_eq!(named_key(0xffc9), Some("F12"));
        assert_eq!(named_key(0x61), None);
    }

    #[test]
    fn test_named_virtual_keys() {
        assert_eq!(named_virtual_key(0x1b), Some("Escape"));
        assert_eq!(named_virtual_key(0x08), Some("Backspace"));
        assert_eq!(named_virtual_key(0x28), Some("ArrowDown"));
        assert_eq!(named_virtual_key(0x70), Some("F1"));
        assert_eq!(named_virtual_key(0x7b), Some("F12"));
        assert_eq!(named_virtual_key(0x41), None);
    }

    #[test]
    fn test_key_value() {
        assert_eq!(key_value("a", None, "a"), "a");
        assert_eq!(key_value("é", None, "eacute"), "é");
        assert_eq!(key_value("\r", Some("Enter"), "Return"), "Enter");
        assert_eq!(key_value("", None, "Shift_L"), "Shift_L");
        assert_eq!(key_value("\u{7f}", None, "Delete"), "Delete");
    }

    #[test]
    fn test_evdev_from_scan_code() {
        // 'A' and Escape share numbering
        assert_eq!(evdev_from_scan_code(0x1e, false), 30);
        assert_eq!(evdev_from_scan_code(0x01, false), 1);
        // Keypad 8 versus the arrow key on the same scan code
        assert_eq!(evdev_from_scan_code(0x48, false), 0x48);
        assert_eq!(evdev_from_scan_code(0x48, true), 103);
        assert_eq!(evdev_from_scan_code(0x1d, true), 97);
    }
}
