//! Dispatch implementations for shell, seat and pointer objects

use log::{debug, info};
use wayland_client::protocol::{
    wl_callback::{self, WlCallback},
    wl_compositor::WlCompositor,
    wl_pointer::{self, WlPointer},
    wl_seat::{self, WlSeat},
    wl_surface::{self, WlSurface},
    wl_touch::{self, WlTouch},
};
use wayland_client::{delegate_noop, Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::wp::cursor_shape::v1::client::{
    wp_cursor_shape_device_v1::WpCursorShapeDeviceV1,
    wp_cursor_shape_manager_v1::WpCursorShapeManagerV1,
};
use wayland_protocols::xdg::decoration::zv1::client::{
    zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
    zxdg_toplevel_decoration_v1::{self, ZxdgToplevelDecorationV1},
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

use super::state::WaylandState;
use crate::event::{Event, MouseButton, ScrollAxis, ScrollSource, TouchInfo, WindowId};

// https://github.com/torvalds/linux/blob/master/include/uapi/linux/input-event-codes.h
const BTN_LEFT: u32 = 0x110;
const BTN_RIGHT: u32 = 0x111;
const BTN_MIDDLE: u32 = 0x112;

pub fn map_pointer_button(button: u32) -> MouseButton {
    match button {
        BTN_LEFT => MouseButton::Left,
        BTN_RIGHT => MouseButton::Right,
        BTN_MIDDLE => MouseButton::Middle,
        other => MouseButton::Other(other),
    }
}

fn map_axis(axis: WEnum<wl_pointer::Axis>) -> Option<ScrollAxis> {
    match axis {
        WEnum::Value(wl_pointer::Axis::VerticalScroll) => Some(ScrollAxis::Vertical),
        WEnum::Value(wl_pointer::Axis::HorizontalScroll) => Some(ScrollAxis::Horizontal),
        _ => None,
    }
}

fn map_axis_source(source: WEnum<wl_pointer::AxisSource>) -> ScrollSource {
    match source {
        WEnum::Value(wl_pointer::AxisSource::Wheel) => ScrollSource::Wheel,
        WEnum::Value(wl_pointer::AxisSource::Finger) => ScrollSource::Finger,
        WEnum::Value(wl_pointer::AxisSource::Continuous) => ScrollSource::Continuous,
        WEnum::Value(wl_pointer::AxisSource::WheelTilt) => ScrollSource::WheelTilt,
        _ => ScrollSource::Unknown,
    }
}

delegate_noop!(WaylandState: ignore WlCompositor);
delegate_noop!(WaylandState: ignore WpCursorShapeManagerV1);
delegate_noop!(WaylandState: ignore WpCursorShapeDeviceV1);
delegate_noop!(WaylandState: ignore ZxdgDecorationManagerV1);

impl Dispatch<WlSurface, WindowId> for WaylandState {
    fn event(
        _state: &mut Self,
        _surface: &WlSurface,
        event: wl_surface::Event,
        window: &WindowId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_surface::Event::PreferredBufferScale { factor } = event {
            debug!("{:?} prefers buffer scale {}", window, factor);
        }
    }
}

impl Dispatch<WlCallback, WindowId> for WaylandState {
    fn event(
        state: &mut Self,
        _callback: &WlCallback,
        event: wl_callback::Event,
        window: &WindowId,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            let Some(native) = state.windows.get_mut(window) else {
                return;
            };
            native.frame_pending = false;
            if native.frame_requested {
                native.frame_requested = false;
                native.frame_pending = true;
                native.surface.frame(qh, *window);
                state.push(Event::FrameUpdate { window: *window });
            }
        }
    }
}

impl Dispatch<XdgWmBase, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        proxy: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            proxy.pong(serial);
        }
    }
}

impl Dispatch<XdgSurface, WindowId> for WaylandState {
    fn event(
        state: &mut Self,
        proxy: &XdgSurface,
        event: xdg_surface::Event,
        window: &WindowId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            proxy.ack_configure(serial);

            let Some(native) = state.windows.get_mut(window) else {
                return;
            };
            let first = !native.configured;
            native.configured = true;

            if let Some((width, height)) = native.pending_size.take() {
                if (width, height) != (native.width, native.height) {
                    native.width = width;
                    native.height = height;
                    if !first {
                        state.push(Event::Resized {
                            window: *window,
                            width,
                            height,
                        });
                    }
                }
            }
        }
    }
}

impl Dispatch<XdgToplevel, WindowId> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &XdgToplevel,
        event: xdg_toplevel::Event,
        window: &WindowId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                // Zero means the client picks its own size
                if width > 0 && height > 0 {
                    if let Some(native) = state.windows.get_mut(window) {
                        native.pending_size = Some((width as u32, height as u32));
                    }
                }
            }
            xdg_toplevel::Event::Close => {
                debug!("Close requested for {:?}", window);
                state.push(Event::CloseRequested { window: *window });
            }
            _ => {}
        }
    }
}

impl Dispatch<ZxdgToplevelDecorationV1, WindowId> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &ZxdgToplevelDecorationV1,
        event: zxdg_toplevel_decoration_v1::Event,
        window: &WindowId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let zxdg_toplevel_decoration_v1::Event::Configure { mode } = event {
            debug!("{:?} decoration mode {:?}", window, mode);
        }
    }
}

impl Dispatch<WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(capabilities),
            } => {
                info!("Seat capabilities: {:?}", capabilities);

                let has_pointer = capabilities.contains(wl_seat::Capability::Pointer);
                if has_pointer && state.pointer.is_none() {
                    let pointer = seat.get_pointer(qh, ());
                    state.cursor_device = state
                        .cursor_shape_manager
                        .as_ref()
                        .map(|manager| manager.get_pointer(&pointer, qh, ()));
                    state.pointer = Some(pointer);
                } else if !has_pointer {
                    if let Some(device) = state.cursor_device.take() {
                        device.destroy();
                    }
                    if let Some(pointer) = state.pointer.take() {
                        if pointer.version() >= 3 {
                            pointer.release();
                        }
                    }
                }

                let has_keyboard = capabilities.contains(wl_seat::Capability::Keyboard);
                if has_keyboard && state.keyboard.is_none() {
                    state.keyboard = Some(seat.get_keyboard(qh, ()));
                } else if !has_keyboard {
                    if let Some(keyboard) = state.keyboard.take() {
                        if keyboard.version() >= 3 {
                            keyboard.release();
                        }
                    }
                    state.xkb = None;
                }

                let has_touch = capabilities.contains(wl_seat::Capability::Touch);
                if has_touch && state.touch.is_none() {
                    state.touch = Some(seat.get_touch(qh, ()));
                } else if !has_touch {
                    if let Some(touch) = state.touch.take() {
                        if touch.version() >= 3 {
                            touch.release();
                        }
                    }
                }
            }
            wl_seat::Event::Name { name } => {
                debug!("Seat name: {}", name);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlPointer, ()> for WaylandState {
    fn event(
        state: &mut Self,
        pointer: &WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => {
                state.pointer_enter_serial = serial;
                // Pointer focus only comes back once a drag grab is over
                state.end_own_drag();
                if let Some(window) = state.window_for_surface(&surface) {
                    let events = state.pointer_tracker.enter(window, surface_x, surface_y);
                    state.events.extend(events);
                    state.apply_cursor();
                }
            }
            wl_pointer::Event::Leave { surface, .. } => {
                if let Some(window) = state.window_for_surface(&surface) {
                    if let Some(event) = state.pointer_tracker.leave(window) {
                        state.push(event);
                    }
                }
            }
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => {
                if let Some(window) = state.pointer_tracker.focus() {
                    let events = state.pointer_tracker.motion(window, surface_x, surface_y);
                    state.events.extend(events);
                }
            }
            wl_pointer::Event::Button {
                serial,
                button,
                state: button_state,
                ..
            } => {
                state.input_serial = serial;
                state.end_own_drag();
                let pressed = button_state == WEnum::Value(wl_pointer::ButtonState::Pressed);
                if pressed {
                    state.button_serial = serial;
                }
                if let Some(window) = state.pointer_tracker.focus() {
                    let button = map_pointer_button(button);
                    if let Some(event) = state.pointer_tracker.button(window, button, pressed) {
                        state.push(event);
                    }
                }
            }
            wl_pointer::Event::Axis { axis, value, .. } => {
                if let Some(axis) = map_axis(axis) {
                    state.scroll.value(axis, value);
                }
            }
            wl_pointer::Event::AxisSource { axis_source } => {
                state.scroll.source(map_axis_source(axis_source));
            }
            wl_pointer::Event::AxisStop { axis, .. } => {
                if let Some(axis) = map_axis(axis) {
                    state.scroll.stop(axis);
                }
            }
            wl_pointer::Event::AxisDiscrete { axis, discrete } => {
                if let Some(axis) = map_axis(axis) {
                    state.scroll.discrete(axis, discrete);
                }
            }
            wl_pointer::Event::AxisValue120 { axis, value120 } => {
                if let Some(axis) = map_axis(axis) {
                    state.scroll.value120(axis, value120);
                }
            }
            wl_pointer::Event::Frame => {
                flush_scroll(state);
            }
            _ => {}
        }

        // Pointers older than version 5 never send frame events
        if pointer.version() < 5 {
            flush_scroll(state);
        }
    }
}

fn flush_scroll(state: &mut WaylandState) {
    if state.scroll.is_empty() {
        return;
    }
    match state.pointer_tracker.focus() {
        Some(window) => {
            let events = state.scroll.frame(window);
            state.events.extend(events);
        }
        None => state.scroll.clear(),
    }
}

impl Dispatch<WlTouch, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _touch: &WlTouch,
        event: wl_touch::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_touch::Event::Down {
                serial,
                surface,
                id,
                x,
                y,
                ..
            } => {
                state.input_serial = serial;
                let Some(window) = state.window_for_surface(&surface) else {
                    return;
                };
                let touch = TouchInfo {
                    id,
                    x,
                    y,
                    pressed: true,
                    major: 0.0,
                    minor: 0.0,
                    orientation: 0.0,
                };
                state.touch_points.insert(id, (window, touch));
                state.push(Event::Touch { window, touch });
            }
            wl_touch::Event::Motion { id, x, y, .. } => {
                if let Some((window, touch)) = state.touch_points.get_mut(&id) {
                    touch.x = x;
                    touch.y = y;
                    let event = Event::Touch {
                        window: *window,
                        touch: *touch,
                    };
                    state.push(event);
                }
            }
            wl_touch::Event::Up { id, .. } => {
                if let Some((window, mut touch)) = state.touch_points.remove(&id) {
                    touch.pressed = false;
                    state.push(Event::Touch { window, touch });
                }
            }
            wl_touch::Event::Shape { id, major, minor } => {
                if let Some((_, touch)) = state.touch_points.get_mut(&id) {
                    touch.major = major;
                    touch.minor = minor;
                }
            }
            wl_touch::Event::Orientation { id, orientation } => {
                if let Some((_, touch)) = state.touch_points.get_mut(&id) {
                    touch.orientation = orientation;
                }
            }
            wl_touch::Event::Cancel => {
                let points: Vec<_> = state.touch_points.drain().map(|(_, p)| p).collect();
                for (window, mut touch) in points {
                    touch.pressed = false;
                    state.push(Event::Touch { window, touch });
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_pointer_button() {
        assert_eq!(map_pointer_button(0x110), MouseButton::Left);
        assert_eq!(map_pointer_button(0x111), MouseButton::Right);
        assert_eq!(map_pointer_button(0x112), MouseButton::Middle);
        assert_eq!(map_pointer_button(0x113), MouseButton::Other(0x113));
    }

    #[test]
    fn test_map_axis_source() {
        assert_eq!(
            map_axis_source(WEnum::Value(wl_pointer::AxisSource::Finger)),
            ScrollSource::Finger
        );
        assert_eq!(map_axis_source(WEnum::Unknown(42)), ScrollSource::Unknown);
    }

    #[test]
    fn test_map_axis() {
        assert_eq!(
            map_axis(WEnum::Value(wl_pointer::Axis::HorizontalScroll)),
            Some(ScrollAxis::Horizontal)
        );
        assert_eq!(map_axis(WEnum::Unknown(7)), None);
    }
}
