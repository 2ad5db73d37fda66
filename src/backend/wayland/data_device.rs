//! wl_data_device handling
//!
//! Implements the clipboard selection and drag-and-drop on the client side.

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::AsFd;

use log::{debug, warn};
use parking_lot::Mutex;
use wayland_client::protocol::{
    wl_data_device::{self, WlDataDevice},
    wl_data_device_manager::{self, WlDataDeviceManager},
    wl_data_offer::{self, WlDataOffer},
    wl_data_source::{self, WlDataSource},
};
use wayland_client::{event_created_child, Connection, Dispatch, Proxy, QueueHandle, WEnum};

use super::state::{DndTarget, SourceRole, WaylandState};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::input::clipboard::{
    negotiate, pick_text_mime, uri_list_paths, DndAction, DndActions, URI_LIST_MIME,
};

/// Mime types and actions announced for an offer
#[derive(Debug, Default)]
pub struct OfferData {
    mime_types: Mutex<Vec<String>>,
    source_actions: Mutex<Option<DndActions>>,
}

impl OfferData {
    pub fn mime_types(&self) -> Vec<String> {
        self.mime_types.lock().clone()
    }
}

/// Convert between our action flags and the protocol's
pub fn to_wl_actions(actions: DndActions) -> wl_data_device_manager::DndAction {
    let mut wl = wl_data_device_manager::DndAction::empty();
    if actions.contains(DndActions::COPY) {
        wl |= wl_data_device_manager::DndAction::Copy;
    }
    if actions.contains(DndActions::MOVE) {
        wl |= wl_data_device_manager::DndAction::Move;
    }
    if actions.contains(DndActions::ASK) {
        wl |= wl_data_device_manager::DndAction::Ask;
    }
    wl
}

fn from_wl_actions(wl: wl_data_device_manager::DndAction) -> DndActions {
    let mut actions = DndActions::empty();
    if wl.contains(wl_data_device_manager::DndAction::Copy) {
        actions |= DndActions::COPY;
    }
    if wl.contains(wl_data_device_manager::DndAction::Move) {
        actions |= DndActions::MOVE;
    }
    if wl.contains(wl_data_device_manager::DndAction::Ask) {
        actions |= DndActions::ASK;
    }
    actions
}

fn single_action(action: DndAction) -> DndActions {
    match action {
        DndAction::None => DndActions::empty(),
        DndAction::Copy => DndActions::COPY,
        DndAction::Move => DndActions::MOVE,
        DndAction::Ask => DndActions::ASK,
    }
}

/// Receive the contents of `offer` as `mime`
///
/// Blocks until the source client closes its end of the pipe.
pub fn receive_offer(conn: &Connection, offer: &WlDataOffer, mime: &str) -> Result<String> {
    let (read, write) = rustix::pipe::pipe_with(rustix::pipe::PipeFlags::CLOEXEC)
        .map_err(std::io::Error::from)?;
    offer.receive(mime.to_string(), write.as_fd());
    drop(write);
    conn.flush()?;

    let mut data = Vec::new();
    File::from(read).read_to_end(&mut data)?;
    String::from_utf8(data).map_err(|e| Error::Clipboard(e.to_string()))
}

impl Dispatch<WlDataDeviceManager, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &WlDataDeviceManager,
        _event: wl_data_device_manager::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlDataDevice, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _device: &WlDataDevice,
        event: wl_data_device::Event,
        _data: &(),
        conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_device::Event::DataOffer { id } => {
                debug!("New data offer {:?}", id.id());
            }
            wl_data_device::Event::Selection { id } => {
                if let Some(old) = state.selection_offer.take() {
                    old.destroy();
                }
                state.selection_offer = id;
            }
            wl_data_device::Event::Enter {
                serial,
                surface,
                x,
                y,
                id,
            } => {
                let Some(offer) = id else {
                    return;
                };
                let Some(window) = state.window_for_surface(&surface) else {
                    offer.destroy();
                    return;
                };

                let mime_types = offer
                    .data::<OfferData>()
                    .map(OfferData::mime_types)
                    .unwrap_or_default();
                let mime = if mime_types.iter().any(|m| m == URI_LIST_MIME) {
                    Some(URI_LIST_MIME.to_string())
                } else {
                    pick_text_mime(&mime_types)
                        .map(str::to_string)
                        .or_else(|| mime_types.first().cloned())
                };
                offer.accept(serial, mime.clone());

                if offer.version() >= 3 {
                    let source_actions = offer
                        .data::<OfferData>()
                        .and_then(|d| *d.source_actions.lock())
                        .unwrap_or(DndActions::COPY | DndActions::MOVE);
                    let action = negotiate(
                        source_actions,
                        DndActions::COPY | DndActions::MOVE,
                        DndAction::Copy,
                    );
                    offer.set_actions(
                        to_wl_actions(DndActions::COPY | DndActions::MOVE),
                        to_wl_actions(single_action(action)),
                    );
                }

                debug!("Drag entered {:?} offering {:?}", window, mime);
                state.dnd = Some(DndTarget {
                    offer,
                    window,
                    mime,
                    x,
                    y,
                });
            }
            wl_data_device::Event::Motion { x, y, .. } => {
                if let Some(target) = state.dnd.as_mut() {
                    target.x = x;
                    target.y = y;
                }
            }
            wl_data_device::Event::Leave => {
                if let Some(target) = state.dnd.take() {
                    target.offer.destroy();
                }
            }
            wl_data_device::Event::Drop => {
                let own_payload = state.own_drop_payload();
                state.end_own_drag();
                let Some(target) = state.dnd.take() else {
                    return;
                };
                let Some(mime) = target.mime.clone() else {
                    target.offer.destroy();
                    return;
                };

                let data = match own_payload {
                    Some(data) => Ok(data),
                    None => receive_offer(conn, &target.offer, &mime),
                };

                match data {
                    Ok(data) => {
                        let data = if mime == URI_LIST_MIME {
                            uri_list_paths(&data).join("\n")
                        } else {
                            data
                        };
                        state.push(Event::Drop {
                            window: target.window,
                            mime,
                            data,
                            x: target.x as i32,
                            y: target.y as i32,
                        });
                    }
                    Err(e) => warn!("Failed to receive dropped data: {}", e),
                }

                if target.offer.version() >= 3 {
                    target.offer.finish();
                }
                target.offer.destroy();
            }
            _ => {}
        }
    }

    event_created_child!(WaylandState, WlDataDevice, [
        wl_data_device::EVT_DATA_OFFER_OPCODE => (WlDataOffer, OfferData::default()),
    ]);
}

impl Dispatch<WlDataOffer, OfferData> for WaylandState {
    fn event(
        _state: &mut Self,
        _offer: &WlDataOffer,
        event: wl_data_offer::Event,
        data: &OfferData,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_offer::Event::Offer { mime_type } => {
                data.mime_types.lock().push(mime_type);
            }
            wl_data_offer::Event::SourceActions {
                source_actions: WEnum::Value(actions),
            } => {
                *data.source_actions.lock() = Some(from_wl_actions(actions));
            }
            _ => {}
        }
    }
}

impl Dispatch<WlDataSource, SourceRole> for WaylandState {
    fn event(
        state: &mut Self,
        source: &WlDataSource,
        event: wl_data_source::Event,
        role: &SourceRole,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_source::Event::Send { mime_type, fd } => {
                let payload = match role {
                    SourceRole::Selection => state.clipboard.serve(&mime_type),
                    SourceRole::Drag => state
                        .drag_payload
                        .as_ref()
                        .filter(|payload| payload.serves(&mime_type))
                        .map(|payload| payload.data.as_str()),
                };
                let Some(text) = payload else {
                    debug!("No data for requested mime type {}", mime_type);
                    return;
                };
                if let Err(e) = File::from(fd).write_all(text.as_bytes()) {
                    warn!("Failed to send {}: {}", mime_type, e);
                }
            }
            wl_data_source::Event::Cancelled => {
                source.destroy();
                match role {
                    SourceRole::Selection => {
                        if state.selection_source.as_ref() == Some(source) {
                            state.selection_source = None;
                            if state.clipboard.lost() {
                                state.push(Event::ClipboardChanged);
                            }
                        }
                    }
                    SourceRole::Drag => {
                        debug!("Drag cancelled");
                        state.drag_source = None;
                        state.drag_payload = None;
                        state.end_own_drag();
                    }
                }
            }
            wl_data_source::Event::DndFinished => {
                debug!("Drag finished");
                source.destroy();
                state.drag_source = None;
                state.drag_payload = None;
                state.end_own_drag();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_conversion() {
        let ours = DndActions::COPY | DndActions::ASK;
        let wl = to_wl_actions(ours);
        assert!(wl.contains(wl_data_device_manager::DndAction::Copy));
        assert!(!wl.contains(wl_data_device_manager::DndAction::Move));
        assert_eq!(from_wl_actions(wl), ours);
    }

    #[test]
    fn test_single_action() {
        assert_eq!(single_action(DndAction::Move), DndActions::MOVE);
        assert!(single_action(DndAction::None).is_empty());
    }
}
