//! wl_keyboard handling and XKB integration

use std::os::fd::OwnedFd;

use log::{debug, warn};
use wayland_client::protocol::wl_keyboard::{self, WlKeyboard};
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum};
use xkbcommon::xkb;

use super::state::WaylandState;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::input::keyboard::{key_value, named_key};

/// Offset between evdev keycodes and XKB keycodes
const EVDEV_OFFSET: u32 = 8;

/// Compiled keymap and modifier state
pub struct XkbKeyboard {
    state: xkb::State,
    // Keeps the keymap alive for `state`
    _keymap: xkb::Keymap,
}

impl XkbKeyboard {
    /// Compile the keymap the compositor shared through `fd`
    pub fn from_fd(fd: OwnedFd, size: u32) -> Result<Self> {
        // Keymaps from wl_keyboard v7 on must be mapped privately
        let map = unsafe {
            memmap2::MmapOptions::new()
                .len(size as usize)
                .map_copy_read_only(&fd)?
        };
        let text = String::from_utf8_lossy(&map)
            .trim_end_matches('\0')
            .to_string();

        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_string(
            &context,
            text,
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| Error::Wayland("could not compile keymap".to_string()))?;
        let state = xkb::State::new(&keymap);

        Ok(Self {
            state,
            _keymap: keymap,
        })
    }

    /// Text, keysym and keysym name produced by an evdev keycode
    pub fn describe(&self, key: u32) -> (String, u32, String) {
        let keycode = xkb::Keycode::new(key + EVDEV_OFFSET);
        let text = self.state.key_get_utf8(keycode);
        let keysym = self.state.key_get_one_sym(keycode);
        (text, keysym.raw(), xkb::keysym_get_name(keysym))
    }

    pub fn update_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.state
            .update_mask(depressed, latched, locked, 0, 0, group);
    }
}

impl Dispatch<WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _keyboard: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => {
                if format != WEnum::Value(wl_keyboard::KeymapFormat::XkbV1) {
                    warn!("Unsupported keymap format {:?}", format);
                    return;
                }
                match XkbKeyboard::from_fd(fd, size) {
                    Ok(xkb) => {
                        debug!("Loaded keymap ({} bytes)", size);
                        state.xkb = Some(xkb);
                    }
                    Err(e) => warn!("Failed to load keymap: {}", e),
                }
            }
            wl_keyboard::Event::Enter { serial, surface, .. } => {
                state.input_serial = serial;
                if let Some(window) = state.window_for_surface(&surface) {
                    state.keys.set_focus(Some(window));
                    state.push(Event::KeyboardEnter { window });
                }
            }
            wl_keyboard::Event::Leave { surface, .. } => {
                if let Some(window) = state.window_for_surface(&surface) {
                    state.push(Event::KeyboardLeave { window });
                }
                state.keys.set_focus(None);
            }
            wl_keyboard::Event::Key {
                serial,
                key,
                state: key_state,
                ..
            } => {
                state.input_serial = serial;
                let Some(window) = state.keys.focus() else {
                    return;
                };

                let pressed = key_state == WEnum::Value(wl_keyboard::KeyState::Pressed);
                let fresh = if pressed {
                    state.keys.press(key)
                } else {
                    state.keys.release(key)
                };
                if !fresh {
                    return;
                }

                let value = match &state.xkb {
                    Some(xkb) => {
                        let (text, keysym, name) = xkb.describe(key);
                        key_value(&text, named_key(keysym), &name)
                    }
                    None => String::new(),
                };
                state.push(Event::Key {
                    window,
                    pressed,
                    value,
                    keycode: key,
                });
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                if let Some(xkb) = state.xkb.as_mut() {
                    xkb.update_modifiers(mods_depressed, mods_latched, mods_locked, group);
                }
            }
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                debug!("Key repeat: {} per second after {} ms", rate, delay);
            }
            _ => {}
        }
    }
}
