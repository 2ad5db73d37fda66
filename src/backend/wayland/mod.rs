//! Wayland backend
//!
//! Windows are xdg-shell toplevels. The connection fd is polled through a
//! calloop source so [`Backend::pump_events`] never blocks.

mod data_device;
mod dispatch;
mod globals;
mod keyboard;
mod state;

use std::collections::VecDeque;
use std::ffi::c_void;
use std::io;
use std::ptr::NonNull;
use std::time::Duration;

use calloop::generic::Generic;
use calloop::{Interest, Mode, PostAction};
use log::{debug, error, info, warn};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle,
};
use wayland_client::backend::WaylandError;
use wayland_client::{Connection, EventQueue, Proxy};
use wayland_protocols::xdg::decoration::zv1::client::zxdg_toplevel_decoration_v1;

use self::state::{SourceRole, WaylandState, WaylandWindow};
use super::{Backend, BackendKind, EventLoop};
use crate::error::{Error, Result};
use crate::event::{CursorKind, Event, WindowId};
use crate::input::clipboard::{pick_text_mime, DndActions, Payload};

const APP_ID: &str = "glwm";

/// Connection to a Wayland compositor
pub struct WaylandBackend {
    conn: Connection,
    queue: EventQueue<WaylandState>,
    state: WaylandState,
    /// Polls the connection fd; the loop data is "fd is readable"
    event_loop: EventLoop<bool>,
    disconnected: bool,
}

impl WaylandBackend {
    /// Connect to `$WAYLAND_DISPLAY` and bind the required globals
    pub fn connect() -> Result<Self> {
        let conn = Connection::connect_to_env()?;
        let mut queue: EventQueue<WaylandState> = conn.new_event_queue();
        let qh = queue.handle();

        conn.display().get_registry(&qh, ());

        let mut state = WaylandState::new(CursorKind::default());
        queue.roundtrip(&mut state)?;

        if state.compositor.is_none() {
            return Err(Error::Wayland("compositor has no wl_compositor".into()));
        }
        if state.wm_base.is_none() {
            return Err(Error::Wayland("compositor has no xdg_wm_base".into()));
        }

        if let (Some(manager), Some(seat)) = (&state.data_device_manager, &state.seat) {
            state.data_device = Some(manager.get_data_device(seat, &qh, ()));
        }

        // Seat capabilities and the keymap arrive after binding
        queue.roundtrip(&mut state)?;

        let event_loop = EventLoop::new()?;
        event_loop
            .handle()
            .insert_source(
                Generic::new(
                    conn.backend().poll_fd().try_clone_to_owned()?,
                    Interest::READ,
                    Mode::Level,
                ),
                |_, _, readable: &mut bool| {
                    *readable = true;
                    Ok(PostAction::Continue)
                },
            )
            .map_err(|e| Error::Wayland(e.to_string()))?;

        info!("Connected to Wayland compositor");

        Ok(Self {
            conn,
            queue,
            state,
            event_loop,
            disconnected: false,
        })
    }

    fn window(&self, id: WindowId) -> Result<&WaylandWindow> {
        self.state.windows.get(&id).ok_or(Error::UnknownWindow(id))
    }

    fn flush(&self) -> Result<()> {
        match self.conn.flush() {
            Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            other => Ok(other?),
        }
    }

    fn pump(&mut self) -> Result<()> {
        self.queue.dispatch_pending(&mut self.state)?;
        self.flush()?;

        if let Some(guard) = self.queue.prepare_read() {
            let mut readable = false;
            self.event_loop
                .dispatch(Some(Duration::ZERO), &mut readable)?;
            if readable {
                match guard.read() {
                    Ok(_) => {}
                    Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        self.queue.dispatch_pending(&mut self.state)?;
        Ok(())
    }
}

impl Backend for WaylandBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wayland
    }

    fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        let display = NonNull::new(self.conn.backend().display_ptr() as *mut c_void)
            .ok_or_else(|| Error::Wayland("null wl_display".into()))?;
        Ok(RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display)))
    }

    fn raw_window_handle(&self, id: WindowId) -> Result<RawWindowHandle> {
        let window = self.window(id)?;
        let surface = NonNull::new(window.surface.id().as_ptr() as *mut c_void)
            .ok_or_else(|| Error::Wayland("null wl_surface".into()))?;
        Ok(RawWindowHandle::Wayland(WaylandWindowHandle::new(surface)))
    }

    fn create_window(
        &mut self,
        id: WindowId,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32)> {
        let qh = self.queue.handle();
        let (Some(compositor), Some(wm_base)) = (&self.state.compositor, &self.state.wm_base)
        else {
            return Err(Error::Wayland("globals are gone".into()));
        };

        let surface = compositor.create_surface(&qh, id);
        let xdg_surface = wm_base.get_xdg_surface(&surface, &qh, id);
        let toplevel = xdg_surface.get_toplevel(&qh, id);
        toplevel.set_title(title.to_string());
        toplevel.set_app_id(APP_ID.to_string());

        let decoration = self.state.decoration_manager.as_ref().map(|manager| {
            let decoration = manager.get_toplevel_decoration(&toplevel, &qh, id);
            decoration.set_mode(zxdg_toplevel_decoration_v1::Mode::ServerSide);
            decoration
        });

        self.state.windows.insert(
            id,
            WaylandWindow {
                surface,
                xdg_surface,
                toplevel,
                decoration,
                width,
                height,
                pending_size: None,
                configured: false,
                frame_pending: false,
                frame_requested: false,
            },
        );

        // The first configure must be acked before anything is attached
        self.window(id)?.surface.commit();
        while !self.window(id)?.configured {
            self.queue.blocking_dispatch(&mut self.state)?;
        }

        let window = self.window(id)?;
        info!(
            "Created Wayland window {:?} '{}' ({}x{})",
            id, title, window.width, window.height
        );
        Ok((window.width, window.height))
    }

    fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        let window = self
            .state
            .windows
            .remove(&id)
            .ok_or(Error::UnknownWindow(id))?;
        window.destroy();

        self.state.pointer_tracker.forget(id);
        if self.state.keys.focus() == Some(id) {
            self.state.keys.set_focus(None);
        }
        self.state.touch_points.retain(|_, (window, _)| *window != id);
        if self.state.dnd.as_ref().is_some_and(|t| t.window == id) {
            if let Some(target) = self.state.dnd.take() {
                target.offer.destroy();
            }
        }

        debug!("Destroyed Wayland window {:?}", id);
        self.flush()
    }

    fn window_size(&self, id: WindowId) -> Option<(u32, u32)> {
        self.state.windows.get(&id).map(|w| (w.width, w.height))
    }

    fn pump_events(&mut self, events: &mut VecDeque<Event>) -> Result<()> {
        if self.disconnected {
            return Ok(());
        }

        let result = self.pump();
        events.extend(self.state.events.drain(..));

        if let Err(e) = &result {
            error!("Wayland connection lost: {}", e);
            self.disconnected = true;
        }
        result
    }

    fn request_frame(&mut self, id: WindowId) -> Result<()> {
        let qh = self.queue.handle();
        let window = self
            .state
            .windows
            .get_mut(&id)
            .ok_or(Error::UnknownWindow(id))?;

        if window.frame_pending {
            window.frame_requested = true;
            return Ok(());
        }

        // The callback rides on the commit made by the next buffer swap
        window.frame_pending = true;
        window.surface.frame(&qh, id);
        self.state.push(Event::FrameUpdate { window: id });
        Ok(())
    }

    fn set_title(&mut self, id: WindowId, title: &str) -> Result<()> {
        self.window(id)?.toplevel.set_title(title.to_string());
        self.flush()
    }

    fn set_resizable(&mut self, id: WindowId, resizable: bool) -> Result<()> {
        let window = self.window(id)?;
        let (width, height) = if resizable {
            (0, 0)
        } else {
            (window.width as i32, window.height as i32)
        };
        window.toplevel.set_min_size(width, height);
        window.toplevel.set_max_size(width, height);
        window.surface.commit();
        self.flush()
    }

    fn set_decorations(&mut self, id: WindowId, decorated: bool) -> Result<()> {
        let window = self.window(id)?;
        match &window.decoration {
            Some(decoration) => {
                decoration.set_mode(if decorated {
                    zxdg_toplevel_decoration_v1::Mode::ServerSide
                } else {
                    zxdg_toplevel_decoration_v1::Mode::ClientSide
                });
                self.flush()
            }
            None => {
                warn!("Compositor does not support xdg-decoration; ignoring");
                Ok(())
            }
        }
    }

    fn set_cursor(&mut self, cursor: CursorKind) -> Result<()> {
        self.state.cursor = cursor;
        if self.state.pointer_tracker.focus().is_some() {
            self.state.apply_cursor();
        }
        self.flush()
    }

    fn set_clipboard(&mut self, mime: &str, text: &str) -> Result<()> {
        let qh = self.queue.handle();
        let (Some(manager), Some(device)) =
            (&self.state.data_device_manager, &self.state.data_device)
        else {
            return Err(Error::Clipboard("no data device available".into()));
        };

        let payload = Payload::new(mime, text);
        let source = manager.create_data_source(&qh, SourceRole::Selection);
        for mime in payload.mime_types() {
            source.offer(mime);
        }
        device.set_selection(Some(&source), self.state.input_serial);

        if let Some(old) = self.state.selection_source.replace(source) {
            old.destroy();
        }
        self.state.clipboard.set(payload);
        self.flush()
    }

    fn clipboard_text(&mut self) -> Option<String> {
        if let Some(text) = self.state.clipboard.owned_text() {
            return Some(text);
        }

        let offer = self.state.selection_offer.as_ref()?;
        let mime_types = offer
            .data::<data_device::OfferData>()
            .map(data_device::OfferData::mime_types)
            .unwrap_or_default();
        let Some(mime) = pick_text_mime(&mime_types) else {
            debug!("Selection has no text; offered {:?}", mime_types);
            return None;
        };

        match data_device::receive_offer(&self.conn, offer, mime) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Failed to read clipboard: {}", e);
                None
            }
        }
    }

    fn start_drag(&mut self, id: WindowId, mime: &str, data: &str) -> Result<()> {
        let qh = self.queue.handle();
        let (Some(manager), Some(device)) =
            (&self.state.data_device_manager, &self.state.data_device)
        else {
            return Err(Error::Wayland("no data device available".into()));
        };
        let origin = &self.window(id)?.surface;

        let payload = Payload::new(mime, data);
        let source = manager.create_data_source(&qh, SourceRole::Drag);
        for mime in payload.mime_types() {
            source.offer(mime);
        }
        if source.version() >= 3 {
            source.set_actions(data_device::to_wl_actions(
                DndActions::COPY | DndActions::MOVE,
            ));
        }
        device.start_drag(Some(&source), origin, None, self.state.button_serial);

        if let Some(old) = self.state.drag_source.replace(source) {
            old.destroy();
        }
        self.state.drag_payload = Some(payload);
        self.state.own_drag_active = true;
        debug!("Started drag from {:?}", id);
        self.flush()
    }

    fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl Drop for WaylandBackend {
    fn drop(&mut self) {
        for (_, window) in self.state.windows.drain() {
            window.destroy();
        }
        let _ = self.conn.flush();
    }
}
