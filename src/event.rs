//! Unified event model
//!
//! Every backend translates its native messages into [`Event`] values. The
//! window manager drains them in arrival order and invokes the matching
//! user callback.

/// Identifier of a window managed by a [`crate::WindowManager`]
///
/// Ids are handed out in creation order and never reused by the same
/// manager, so a stale id can never address a newer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub usize);

/// Scroll distance reported per wheel notch on backends that only know notches
pub const LINE_SCROLL_PIXELS: f64 = 10.0;

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Any other button, with the backend's raw button code
    Other(u32),
}

/// Scroll axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

/// Physical source of a scroll event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollSource {
    Wheel,
    Finger,
    Continuous,
    WheelTilt,
    #[default]
    Unknown,
}

/// Cursor shapes understood by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorKind {
    #[default]
    Arrow,
    IBeam,
    Crosshair,
    Hand,
    HResize,
    VResize,
    NotAllowed,
}

/// A scroll step after normalization
///
/// Positive values scroll down (vertical) or right (horizontal).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollInfo {
    pub axis: ScrollAxis,
    pub source: ScrollSource,
    /// Distance in surface pixels
    pub value: f64,
    /// Wheel notches, when the device reports them
    pub discrete: Option<i32>,
    /// The scroll sequence on this axis has ended (kinetic scrolling)
    pub stopped: bool,
}

/// A touch point update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchInfo {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    /// `true` while the point is in contact
    pub pressed: bool,
    pub major: f64,
    pub minor: f64,
    pub orientation: f64,
}

/// Events produced by the backends
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PointerEnter { window: WindowId, x: f64, y: f64 },
    PointerLeave { window: WindowId },
    PointerMotion { window: WindowId, x: f64, y: f64 },
    PointerButton { window: WindowId, button: MouseButton, pressed: bool },
    Scroll { window: WindowId, scroll: ScrollInfo },
    KeyboardEnter { window: WindowId },
    KeyboardLeave { window: WindowId },
    Key { window: WindowId, pressed: bool, value: String, keycode: u32 },
    Touch { window: WindowId, touch: TouchInfo },
    Resized { window: WindowId, width: u32, height: u32 },
    FrameUpdate { window: WindowId },
    CloseRequested { window: WindowId },
    /// Data dropped on a window
    Drop { window: WindowId, mime: String, data: String, x: i32, y: i32 },
    /// Another client took the clipboard selection
    ClipboardChanged,
}

impl Event {
    /// The window this event targets, if any
    pub fn window(&self) -> Option<WindowId> {
        match self {
            Event::PointerEnter { window, .. }
            | Event::PointerLeave { window }
            | Event::PointerMotion { window, .. }
            | Event::PointerButton { window, .. }
            | Event::Scroll { window, .. }
            | Event::KeyboardEnter { window }
            | Event::KeyboardLeave { window }
            | Event::Key { window, .. }
            | Event::Touch { window, .. }
            | Event::Resized { window, .. }
            | Event::FrameUpdate { window }
            | Event::CloseRequested { window }
            | Event::Drop { window, .. } => Some(*window),
            Event::ClipboardChanged => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_window() {
        let event = Event::Resized {
            window: WindowId(3),
            width: 10,
            height: 20,
        };
        assert_eq!(event.window(), Some(WindowId(3)));
        assert_eq!(Event::ClipboardChanged.window(), None);
    }

    #[test]
    fn test_window_id_ordering() {
        assert!(WindowId(1) < WindowId(2));
    }

    #[test]
    fn test_cursor_kind_as_map_key() {
        let mut cursors = std::collections::HashMap::new();
        cursors.insert(CursorKind::Hand, 58u64);
        cursors.insert(CursorKind::IBeam, 152);
        assert_eq!(cursors.get(&CursorKind::Hand), Some(&58));
        assert_eq!(cursors.get(&CursorKind::Arrow), None);
    }
}
