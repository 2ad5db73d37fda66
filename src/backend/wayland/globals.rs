//! Registry handling
//!
//! Binds the globals the backend needs as the compositor announces them.

use log::debug;
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_data_device_manager::WlDataDeviceManager,
    wl_registry::{self, WlRegistry}, wl_seat::WlSeat,
};
use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_manager_v1::WpCursorShapeManagerV1;
use wayland_protocols::xdg::decoration::zv1::client::zxdg_decoration_manager_v1::ZxdgDecorationManagerV1;
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;

use super::state::WaylandState;

/// Highest interface versions the backend implements
pub const COMPOSITOR_VERSION: u32 = 6;
pub const SEAT_VERSION: u32 = 8;
pub const WM_BASE_VERSION: u32 = 6;
pub const DATA_DEVICE_MANAGER_VERSION: u32 = 3;
pub const CURSOR_SHAPE_VERSION: u32 = 1;
pub const DECORATION_VERSION: u32 = 1;

impl Dispatch<WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        {
            match interface.as_str() {
                "wl_compositor" => {
                    state.compositor = Some(registry.bind::<WlCompositor, _, _>(
                        name,
                        version.min(COMPOSITOR_VERSION),
                        qh,
                        (),
                    ));
                }
                "wl_seat" if state.seat.is_none() => {
                    state.seat = Some(registry.bind::<WlSeat, _, _>(
                        name,
                        version.min(SEAT_VERSION),
                        qh,
                        (),
                    ));
                }
                "xdg_wm_base" => {
                    state.wm_base = Some(registry.bind::<XdgWmBase, _, _>(
                        name,
                        version.min(WM_BASE_VERSION),
                        qh,
                        (),
                    ));
                }
                "wl_data_device_manager" => {
                    state.data_device_manager = Some(registry.bind::<WlDataDeviceManager, _, _>(
                        name,
                        version.min(DATA_DEVICE_MANAGER_VERSION),
                        qh,
                        (),
                    ));
                }
                "wp_cursor_shape_manager_v1" => {
                    state.cursor_shape_manager = Some(registry.bind::<WpCursorShapeManagerV1, _, _>(
                        name,
                        version.min(CURSOR_SHAPE_VERSION),
                        qh,
                        (),
                    ));
                }
                "zxdg_decoration_manager_v1" => {
                    state.decoration_manager = Some(registry.bind::<ZxdgDecorationManagerV1, _, _>(
                        name,
                        version.min(DECORATION_VERSION),
                        qh,
                        (),
                    ));
                }
                _ => {
                    debug!("Unused global: {} v{}", interface, version);
                }
            }
        }
    }
}
