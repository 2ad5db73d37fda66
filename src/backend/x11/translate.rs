//! Pure X11 protocol mappings

use std::ffi::{c_long, c_uint};

use x11_dl::xlib;

use crate::event::{CursorKind, MouseButton, ScrollAxis};

/// What a core protocol button number stands for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonAction {
    Button(MouseButton),
    /// Wheel notch, positive down or right
    Scroll(ScrollAxis, f64),
}

/// Without detectable auto-repeat a held key produces a release and a press
/// with the same keycode and timestamp
pub fn is_repeat_pair(release: &xlib::XKeyEvent, next: &xlib::XKeyEvent) -> bool {
    release.type_ == xlib::KeyRelease
        && next.type_ == xlib::KeyPress
        && next.keycode == release.keycode
        && next.time == release.time
}

/// Map a core button number; 4 to 7 are the wheel
pub fn map_button(button: c_uint) -> ButtonAction {
    match button {
        1 => ButtonAction::Button(MouseButton::Left),
        2 => ButtonAction::Button(MouseButton::Middle),
        3 => ButtonAction::Button(MouseButton::Right),
        4 => ButtonAction::Scroll(ScrollAxis::Vertical, -1.0),
        5 => ButtonAction::Scroll(ScrollAxis::Vertical, 1.0),
        6 => ButtonAction::Scroll(ScrollAxis::Horizontal, -1.0),
        7 => ButtonAction::Scroll(ScrollAxis::Horizontal, 1.0),
        other => ButtonAction::Button(MouseButton::Other(other)),
    }
}

/// Glyph index in the standard cursor font
pub fn cursor_shape(cursor: CursorKind) -> c_uint {
    match cursor {
        CursorKind::Arrow => 68,       // XC_left_ptr
        CursorKind::IBeam => 152,      // XC_xterm
        CursorKind::Crosshair => 34,   // XC_crosshair
        CursorKind::Hand => 60,        // XC_hand2
        CursorKind::HResize => 108,    // XC_sb_h_double_arrow
        CursorKind::VResize => 116,    // XC_sb_v_double_arrow
        CursorKind::NotAllowed => 0,   // XC_X_cursor
    }
}

const MWM_HINTS_DECORATIONS: c_long = 1 << 1;

/// `_MOTIF_WM_HINTS`: flags, functions, decorations, input mode, status
pub fn motif_hints(decorated: bool) -> [c_long; 5] {
    [MWM_HINTS_DECORATIONS, 0, decorated as c_long, 0, 0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_button() {
        assert_eq!(map_button(1), ButtonAction::Button(MouseButton::Left));
        assert_eq!(map_button(2), ButtonAction::Button(MouseButton::Middle));
        assert_eq!(map_button(3), ButtonAction::Button(MouseButton::Right));
        assert_eq!(map_button(8), ButtonAction::Button(MouseButton::Other(8)));
    }

    #[test]
    fn test_wheel_buttons() {
        assert_eq!(
            map_button(4),
            ButtonAction::Scroll(ScrollAxis::Vertical, -1.0)
        );
        assert_eq!(map_button(5), ButtonAction::Scroll(ScrollAxis::Vertical, 1.0));
        assert_eq!(
            map_button(6),
            ButtonAction::Scroll(ScrollAxis::Horizontal, -1.0)
        );
        assert_eq!(
            map_button(7),
            ButtonAction::Scroll(ScrollAxis::Horizontal, 1.0)
        );
    }

    fn key_event(type_: i32, keycode: u32, time: xlib::Time) -> xlib::XKeyEvent {
        let mut event: xlib::XKeyEvent = unsafe { std::mem::zeroed() };
        event.type_ = type_;
        event.keycode = keycode;
        event.time = time;
        event
    }

    #[test]
    fn test_repeat_pair() {
        let release = key_event(xlib::KeyRelease, 38, 1000);
        assert!(is_repeat_pair(&release, &key_event(xlib::KeyPress, 38, 1000)));
        // A real release followed by a later press of the same key
        assert!(!is_repeat_pair(&release, &key_event(xlib::KeyPress, 38, 1040)));
        assert!(!is_repeat_pair(&release, &key_event(xlib::KeyPress, 39, 1000)));
        assert!(!is_repeat_pair(&release, &key_event(xlib::KeyRelease, 38, 1000)));
    }

    #[test]
    fn test_cursor_shape() {
        assert_eq!(cursor_shape(CursorKind::Arrow), 68);
        assert_eq!(cursor_shape(CursorKind::IBeam), 152);
        assert_eq!(cursor_shape(CursorKind::Hand), 60);
    }

    #[test]
    fn test_motif_hints() {
        assert_eq!(motif_hints(true)[2], 1);
        assert_eq!(motif_hints(false)[2], 0);
        assert_eq!(motif_hints(false)[0], MWM_HINTS_DECORATIONS);
    }
}
