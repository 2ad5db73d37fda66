//! Pointer (mouse/trackpad) handling

use log::debug;

use crate::event::{
    Event, MouseButton, ScrollAxis, ScrollInfo, ScrollSource, WindowId, LINE_SCROLL_PIXELS,
};

/// Pointer state shared by all windows of a backend
#[derive(Debug)]
pub struct PointerTracker {
    /// Window the pointer is inside
    focus: Option<WindowId>,
    /// Position in focused window coordinates
    position: (f64, f64),
    /// Currently pressed buttons
    pressed_buttons: Vec<MouseButton>,
}

impl PointerTracker {
    /// Create a new pointer
    pub fn new() -> Self {
        Self {
            focus: None,
            position: (0.0, 0.0),
            pressed_buttons: Vec::new(),
        }
    }

    /// The pointer entered `window`
    ///
    /// Emits a leave for the previously entered window, if any. Entering the
    /// window the pointer is already inside emits nothing.
    pub fn enter(&mut self, window: WindowId, x: f64, y: f64) -> Vec<Event> {
        self.position = (x, y);
        if self.focus == Some(window) {
            return Vec::new();
        }

        let mut events = Vec::with_capacity(2);
        if let Some(old) = self.focus.take() {
            events.push(Event::PointerLeave { window: old });
        }
        debug!("Pointer entered {:?} at ({}, {})", window, x, y);
        self.focus = Some(window);
        events.push(Event::PointerEnter { window, x, y });
        events
    }

    /// The pointer moved inside `window`
    ///
    /// Backends without native enter notifications get the enter here.
    pub fn motion(&mut self, window: WindowId, x: f64, y: f64) -> Vec<Event> {
        let mut events = self.enter(window, x, y);
        events.push(Event::PointerMotion { window, x, y });
        events
    }

    /// The pointer left `window`
    pub fn leave(&mut self, window: WindowId) -> Option<Event> {
        if self.focus != Some(window) {
            return None;
        }
        debug!("Pointer left {:?}", window);
        self.focus = None;
        self.pressed_buttons.clear();
        Some(Event::PointerLeave { window })
    }

    /// A button changed state over `window`
    ///
    /// Repeated presses of a held button are dropped.
    pub fn button(&mut self, window: WindowId, button: MouseButton, pressed: bool) -> Option<Event> {
        if pressed {
            if self.pressed_buttons.contains(&button) {
                return None;
            }
            self.pressed_buttons.push(button);
        } else {
            self.pressed_buttons.retain(|b| *b != button);
        }
        Some(Event::PointerButton {
            window,
            button,
            pressed,
        })
    }

    /// Forget `window`, e.g. when it is destroyed
    pub fn forget(&mut self, window: WindowId) {
        if self.focus == Some(window) {
            self.focus = None;
            self.pressed_buttons.clear();
        }
    }

    /// Get the window the pointer is inside
    pub fn focus(&self) -> Option<WindowId> {
        self.focus
    }

    /// Get current position
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Get currently pressed buttons
    pub fn pressed_buttons(&self) -> &[MouseButton] {
        &self.pressed_buttons
    }

    /// Check if any button is pressed
    pub fn has_button_pressed(&self) -> bool {
        !self.pressed_buttons.is_empty()
    }
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Scroll value for backends that report wheel notches
///
/// `notches` follows the crate convention: positive is down or right.
pub fn scroll_from_notches(axis: ScrollAxis, notches: f64, source: ScrollSource) -> ScrollInfo {
    let discrete = (notches != 0.0 && notches.fract() == 0.0).then_some(notches as i32);
    ScrollInfo {
        axis,
        source,
        value: notches * LINE_SCROLL_PIXELS,
        discrete,
        stopped: false,
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct AxisAccum {
    touched: bool,
    value: f64,
    discrete: i32,
    value120: i32,
    stopped: bool,
}

/// Groups the axis events of one `wl_pointer.frame`
#[derive(Debug, Default)]
pub struct ScrollFrame {
    source: Option<ScrollSource>,
    vertical: AxisAccum,
    horizontal: AxisAccum,
}

impl ScrollFrame {
    pub fn new() -> Self {
        Self::default()
    }

    fn axis_mut(&mut self, axis: ScrollAxis) -> &mut AxisAccum {
        match axis {
            ScrollAxis::Vertical => &mut self.vertical,
            ScrollAxis::Horizontal => &mut self.horizontal,
        }
    }

    /// `wl_pointer.axis_source`
    pub fn source(&mut self, source: ScrollSource) {
        self.source = Some(source);
    }

    /// `wl_pointer.axis`, in surface pixels
    pub fn value(&mut self, axis: ScrollAxis, value: f64) {
        let accum = self.axis_mut(axis);
        accum.touched = true;
        accum.value += value;
    }

    /// `wl_pointer.axis_discrete` (protocol versions 5 to 7)
    pub fn discrete(&mut self, axis: ScrollAxis, steps: i32) {
        let accum = self.axis_mut(axis);
        accum.touched = true;
        accum.discrete += steps;
    }

    /// `wl_pointer.axis_value120` (protocol version 8 and later)
    pub fn value120(&mut self, axis: ScrollAxis, value120: i32) {
        let accum = self.axis_mut(axis);
        accum.touched = true;
        accum.value120 += value120;
    }

    /// `wl_pointer.axis_stop`
    pub fn stop(&mut self, axis: ScrollAxis) {
        let accum = self.axis_mut(axis);
        accum.touched = true;
        accum.stopped = true;
    }

    /// Whether any axis event is pending
    pub fn is_empty(&self) -> bool {
        !self.vertical.touched && !self.horizontal.touched
    }

    /// Drop the accumulated values, e.g. when no window has the pointer
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// `wl_pointer.frame`: emit the accumulated scroll for `window` and reset
    pub fn frame(&mut self, window: WindowId) -> Vec<Event> {
        let source = self.source.take().unwrap_or_default();
        let mut events = Vec::new();

        for axis in [ScrollAxis::Vertical, ScrollAxis::Horizontal] {
            let accum = std::mem::take(self.axis_mut(axis));
            if !accum.touched {
                continue;
            }

            let notches = accum.discrete + accum.value120 / 120;
            events.push(Event::Scroll {
                window,
                scroll: ScrollInfo {
                    axis,
                    source,
                    value: accum.value,
                    discrete: (notches != 0).then_some(notches),
                    stopped: accum.stopped,
                },
            });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_emits_enter_first() {
        let mut pointer = PointerTracker::new();
        let window = WindowId(0);

        let events = pointer.motion(window, 10.0, 5.0);
        assert_eq!(
            events,
            vec![
                Event::PointerEnter {
                    window,
                    x: 10.0,
                    y: 5.0
                },
                Event::PointerMotion {
                    window,
                    x: 10.0,
                    y: 5.0
                },
            ]
        );

        let events = pointer.motion(window, 11.0, 5.0);
        assert_eq!(events.len(), 1);
        assert_eq!(pointer.position(), (11.0, 5.0));
    }

    #[test]
    fn test_enter_other_window_leaves_previous() {
        let mut pointer = PointerTracker::new();
        pointer.enter(WindowId(0), 0.0, 0.0);

        let events = pointer.enter(WindowId(1), 3.0, 4.0);
        assert_eq!(events[0], Event::PointerLeave { window: WindowId(0) });
        assert_eq!(
            events[1],
            Event::PointerEnter {
                window: WindowId(1),
                x: 3.0,
                y: 4.0
            }
        );
        assert_eq!(pointer.focus(), Some(WindowId(1)));
    }

    #[test]
    fn test_leave_only_when_inside() {
        let mut pointer = PointerTracker::new();
        assert_eq!(pointer.leave(WindowId(0)), None);

        pointer.enter(WindowId(0), 0.0, 0.0);
        assert_eq!(
            pointer.leave(WindowId(0)),
            Some(Event::PointerLeave { window: WindowId(0) })
        );
        assert_eq!(pointer.leave(WindowId(0)), None);
    }

    #[test]
    fn test_button_press_release() {
        let mut pointer = PointerTracker::new();
        let window = WindowId(0);

        assert!(pointer.button(window, MouseButton::Left, true).is_some());
        assert!(pointer.has_button_pressed());
        assert!(pointer.button(window, MouseButton::Left, true).is_none());

        let release = pointer.button(window, MouseButton::Left, false);
        assert_eq!(
            release,
            Some(Event::PointerButton {
                window,
                button: MouseButton::Left,
                pressed: false
            })
        );
        assert!(!pointer.has_button_pressed());
    }

    #[test]
    fn test_scroll_from_notches() {
        let info = scroll_from_notches(ScrollAxis::Vertical, -2.0, ScrollSource::Wheel);
        assert_eq!(info.value, -2.0 * LINE_SCROLL_PIXELS);
        assert_eq!(info.discrete, Some(-2));

        let info = scroll_from_notches(ScrollAxis::Horizontal, 0.25, ScrollSource::Finger);
        assert_eq!(info.value, 0.25 * LINE_SCROLL_PIXELS);
        assert_eq!(info.discrete, None);
    }

    #[test]
    fn test_scroll_frame_accumulates() {
        let mut frame = ScrollFrame::new();
        let window = WindowId(2);
        assert!(frame.is_empty());

        frame.source(ScrollSource::Wheel);
        frame.value120(ScrollAxis::Vertical, 120);
        frame.value(ScrollAxis::Vertical, 15.0);
        frame.value(ScrollAxis::Horizontal, -3.0);

        let events = frame.frame(window);
        assert_eq!(events.len(), 2);
        match &events[0] {
            Event::Scroll { scroll, .. } => {
                assert_eq!(scroll.axis, ScrollAxis::Vertical);
                assert_eq!(scroll.source, ScrollSource::Wheel);
                assert_eq!(scroll.value, 15.0);
                assert_eq!(scroll.discrete, Some(1));
            }
            other => panic!("unexpected event {:?}", other),
        }
        match &events[1] {
            Event::Scroll { scroll, .. } => {
                assert_eq!(scroll.axis, ScrollAxis::Horizontal);
                assert_eq!(scroll.discrete, None);
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert!(frame.is_empty());
        assert!(frame.frame(window).is_empty());
    }

    #[test]
    fn test_scroll_frame_stop() {
        let mut frame = ScrollFrame::new();
        frame.source(ScrollSource::Finger);
        frame.stop(ScrollAxis::Vertical);

        let events = frame.frame(WindowId(0));
        match &events[..] {
            [Event::Scroll { scroll, .. }] => {
                assert!(scroll.stopped);
                assert_eq!(scroll.value, 0.0);
                assert_eq!(scroll.source, ScrollSource::Finger);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }
}
