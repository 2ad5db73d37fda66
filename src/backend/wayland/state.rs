//! Dispatch state of the Wayland backend

use std::collections::HashMap;

use log::debug;
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_data_device::WlDataDevice,
    wl_data_device_manager::WlDataDeviceManager, wl_data_offer::WlDataOffer,
    wl_data_source::WlDataSource, wl_keyboard::WlKeyboard, wl_pointer::WlPointer,
    wl_seat::WlSeat, wl_surface::WlSurface, wl_touch::WlTouch,
};
use wayland_client::Proxy;
use wayland_protocols::wp::cursor_shape::v1::client::{
    wp_cursor_shape_device_v1::{self, WpCursorShapeDeviceV1},
    wp_cursor_shape_manager_v1::WpCursorShapeManagerV1,
};
use wayland_protocols::xdg::decoration::zv1::client::{
    zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
    zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1,
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::XdgSurface, xdg_toplevel::XdgToplevel, xdg_wm_base::XdgWmBase,
};

use super::keyboard::XkbKeyboard;
use crate::event::{CursorKind, Event, TouchInfo, WindowId};
use crate::input::{Clipboard, KeyTracker, Payload, PointerTracker, ScrollFrame};

/// Native objects and state of one toplevel
pub struct WaylandWindow {
    pub surface: WlSurface,
    pub xdg_surface: XdgSurface,
    pub toplevel: XdgToplevel,
    pub decoration: Option<ZxdgToplevelDecorationV1>,
    pub width: u32,
    pub height: u32,
    /// Size from the last `xdg_toplevel.configure`, applied on `xdg_surface.configure`
    pub pending_size: Option<(u32, u32)>,
    pub configured: bool,
    /// A `wl_surface.frame` callback is in flight
    pub frame_pending: bool,
    /// A frame was requested while the callback was in flight
    pub frame_requested: bool,
}

impl WaylandWindow {
    pub fn destroy(self) {
        if let Some(decoration) = self.decoration {
            decoration.destroy();
        }
        self.toplevel.destroy();
        self.xdg_surface.destroy();
        self.surface.destroy();
    }
}

/// Drop target currently hovered by a drag
pub struct DndTarget {
    pub offer: WlDataOffer,
    pub window: WindowId,
    pub mime: Option<String>,
    pub x: f64,
    pub y: f64,
}

/// What a data source we created is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    Selection,
    Drag,
}

/// State passed to every Wayland dispatch handler
#[derive(Default)]
pub struct WaylandState {
    // globals
    pub compositor: Option<WlCompositor>,
    pub wm_base: Option<XdgWmBase>,
    pub seat: Option<WlSeat>,
    pub data_device_manager: Option<WlDataDeviceManager>,
    pub cursor_shape_manager: Option<WpCursorShapeManagerV1>,
    pub decoration_manager: Option<ZxdgDecorationManagerV1>,

    // seat devices
    pub pointer: Option<WlPointer>,
    pub cursor_device: Option<WpCursorShapeDeviceV1>,
    pub keyboard: Option<WlKeyboard>,
    pub touch: Option<WlTouch>,
    pub data_device: Option<WlDataDevice>,

    pub windows: HashMap<WindowId, WaylandWindow>,
    /// Translated events waiting for the next pump
    pub events: Vec<Event>,

    // input
    pub pointer_tracker: PointerTracker,
    pub scroll: ScrollFrame,
    pub keys: KeyTracker,
    pub xkb: Option<XkbKeyboard>,
    pub touch_points: HashMap<i32, (WindowId, TouchInfo)>,
    pub cursor: CursorKind,
    pub pointer_enter_serial: u32,
    /// Serial of the last key or button event, used for the selection
    pub input_serial: u32,
    /// Serial of the last button press, used to start drags
    pub button_serial: u32,

    // data device
    pub clipboard: Clipboard,
    pub selection_source: Option<WlDataSource>,
    pub selection_offer: Option<WlDataOffer>,
    pub drag_source: Option<WlDataSource>,
    /// Data of our latest drag; answers its send requests
    pub drag_payload: Option<Payload>,
    /// A drag we started has not been dropped or cancelled yet
    pub own_drag_active: bool,
    pub dnd: Option<DndTarget>,
}

impl WaylandState {
    pub fn new(cursor: CursorKind) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// Window a surface belongs to
    pub fn window_for_surface(&self, surface: &WlSurface) -> Option<WindowId> {
        surface
            .data::<WindowId>()
            .copied()
            .filter(|id| self.windows.contains_key(id))
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Data for a drop of our own drag, which we cannot read back through
    /// a pipe we are the ones to answer
    pub fn own_drop_payload(&self) -> Option<String> {
        if !self.own_drag_active {
            return None;
        }
        self.drag_payload.as_ref().map(|payload| payload.data.clone())
    }

    /// Our drag ended; the payload stays to answer late send requests
    pub fn end_own_drag(&mut self) {
        if self.own_drag_active {
            debug!("Own drag ended");
        }
        self.own_drag_active = false;
    }

    /// Apply the current cursor to the pointer
    pub fn apply_cursor(&self) {
        let Some(device) = &self.cursor_device else {
            debug!("Compositor has no cursor-shape support");
            return;
        };
        device.set_shape(self.pointer_enter_serial, cursor_shape(self.cursor));
    }
}

fn cursor_shape(cursor: CursorKind) -> wp_cursor_shape_device_v1::Shape {
    use wp_cursor_shape_device_v1::Shape;
    match cursor {
        CursorKind::Arrow => Shape::Default,
        CursorKind::IBeam => Shape::Text,
        CursorKind::Crosshair => Shape::Crosshair,
        CursorKind::Hand => Shape::Pointer,
        CursorKind::HResize => Shape::EwResize,
        CursorKind::VResize => Shape::NsResize,
        CursorKind::NotAllowed => Shape::NotAllowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wp_cursor_shape_device_v1::Shape;

    #[test]
    fn test_cursor_shape_mapping() {
        assert_eq!(cursor_shape(CursorKind::Arrow), Shape::Default);
        assert_eq!(cursor_shape(CursorKind::IBeam), Shape::Text);
        assert_eq!(cursor_shape(CursorKind::HResize), Shape::EwResize);
    }

    #[test]
    fn test_state_defaults() {
        let state = WaylandState::new(CursorKind::Hand);
        assert_eq!(state.cursor, CursorKind::Hand);
        assert!(state.windows.is_empty());
        assert!(state.events.is_empty());
        assert!(!state.own_drag_active);
    }

    #[test]
    fn test_own_drop_payload_only_while_dragging() {
        let mut state = WaylandState::new(CursorKind::Arrow);
        state.drag_payload = Some(Payload::new("text/plain", "dragged"));
        assert_eq!(state.own_drop_payload(), None);

        state.own_drag_active = true;
        assert_eq!(state.own_drop_payload().as_deref(), Some("dragged"));

        // No dnd_finished from a version 1 or 2 data device: the drop alone
        // ends the drag, so later foreign drops are read from their offer
        state.end_own_drag();
        assert_eq!(state.own_drop_payload(), None);
        assert!(state.drag_payload.as_ref().is_some_and(|p| p.serves("text/plain")));
    }
}
