//! Backend module
//!
//! This module contains the platform backends:
//! - Wayland client (xdg-shell windows, xkbcommon keyboard, data device)
//! - X11 through Xlib loaded at runtime
//! - Win32
//!
//! Every backend implements [`Backend`]; the window manager only talks to
//! that trait.

use std::collections::VecDeque;
use std::fmt;

use log::{info, warn};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::BackendPreference;
use crate::error::{Error, Result};
use crate::event::{CursorKind, Event, WindowId};

#[cfg(all(unix, not(target_os = "macos")))]
pub mod event_loop;
#[cfg(all(unix, not(target_os = "macos")))]
pub mod wayland;
#[cfg(windows)]
pub mod win32;
#[cfg(all(unix, not(target_os = "macos")))]
pub mod x11;

#[cfg(all(unix, not(target_os = "macos")))]
pub use event_loop::EventLoop;

/// Which platform a backend talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Wayland,
    X11,
    Win32,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Wayland => write!(f, "wayland"),
            BackendKind::X11 => write!(f, "x11"),
            BackendKind::Win32 => write!(f, "win32"),
        }
    }
}

/// A native windowing system connection
///
/// Windows are addressed by the [`WindowId`] the manager allocated before
/// calling [`create_window`](Backend::create_window). Input is never
/// delivered directly; [`pump_events`](Backend::pump_events) appends the
/// translated events to the manager's queue.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Display handle for GL context creation
    fn raw_display_handle(&self) -> Result<RawDisplayHandle>;

    /// Native handle of a window
    fn raw_window_handle(&self, id: WindowId) -> Result<RawWindowHandle>;

    /// Create and map a window; returns its actual size
    fn create_window(&mut self, id: WindowId, title: &str, width: u32, height: u32)
        -> Result<(u32, u32)>;

    fn destroy_window(&mut self, id: WindowId) -> Result<()>;

    /// Last known size of a window
    fn window_size(&self, id: WindowId) -> Option<(u32, u32)>;

    /// Read pending native events without blocking
    fn pump_events(&mut self, events: &mut VecDeque<Event>) -> Result<()>;

    /// Ask for a [`Event::FrameUpdate`] when the window should draw next
    fn request_frame(&mut self, id: WindowId) -> Result<()>;

    fn set_title(&mut self, id: WindowId, title: &str) -> Result<()>;

    fn set_resizable(&mut self, id: WindowId, resizable: bool) -> Result<()>;

    fn set_decorations(&mut self, id: WindowId, decorated: bool) -> Result<()>;

    /// Cursor shown over every window of this backend
    fn set_cursor(&mut self, cursor: CursorKind) -> Result<()>;

    /// Take the clipboard selection with `text`
    fn set_clipboard(&mut self, mime: &str, text: &str) -> Result<()>;

    /// Current clipboard text, from us or another client
    fn clipboard_text(&mut self) -> Option<String>;

    /// Start dragging `data` out of window `id`
    fn start_drag(&mut self, id: WindowId, mime: &str, data: &str) -> Result<()>;

    /// The display connection is gone
    fn is_disconnected(&self) -> bool;
}

/// Connect to the first usable windowing system
pub fn open(preference: BackendPreference) -> Result<Box<dyn Backend>> {
    let mut failures = Vec::new();

    for kind in candidates(preference) {
        match connect(kind) {
            Ok(backend) => {
                info!("Using {} backend", kind);
                return Ok(backend);
            }
            Err(e) => {
                warn!("Could not open {} backend: {}", kind, e);
                failures.push(format!("{}: {}", kind, e));
            }
        }
    }

    if failures.is_empty() {
        failures.push(format!("{:?} is not available on this platform", preference));
    }
    Err(Error::NoBackend(failures.join("; ")))
}

fn candidates(preference: BackendPreference) -> Vec<BackendKind> {
    let native: &[BackendKind] = if cfg!(windows) {
        &[BackendKind::Win32]
    } else if cfg!(all(unix, not(target_os = "macos"))) {
        &[BackendKind::Wayland, BackendKind::X11]
    } else {
        &[]
    };

    let wanted = match preference {
        BackendPreference::Auto => return native.to_vec(),
        BackendPreference::Wayland => BackendKind::Wayland,
        BackendPreference::X11 => BackendKind::X11,
        BackendPreference::Win32 => BackendKind::Win32,
    };
    native.iter().copied().filter(|k| *k == wanted).collect()
}

fn connect(kind: BackendKind) -> Result<Box<dyn Backend>> {
    match kind {
        #[cfg(all(unix, not(target_os = "macos")))]
        BackendKind::Wayland => Ok(Box::new(wayland::WaylandBackend::connect()?)),
        #[cfg(all(unix, not(target_os = "macos")))]
        BackendKind::X11 => Ok(Box::new(x11::X11Backend::connect()?)),
        #[cfg(windows)]
        BackendKind::Win32 => Ok(Box::new(win32::Win32Backend::connect()?)),
        #[allow(unreachable_patterns)]
        other => Err(Error::NoBackend(format!("{} is not compiled in", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_auto() {
        let auto = candidates(BackendPreference::Auto);
        if cfg!(windows) {
            assert_eq!(auto, vec![BackendKind::Win32]);
        } else if cfg!(all(unix, not(target_os = "macos"))) {
            assert_eq!(auto, vec![BackendKind::Wayland, BackendKind::X11]);
        }
    }

    #[test]
    fn test_candidates_forced() {
        if cfg!(all(unix, not(target_os = "macos"))) {
            assert_eq!(candidates(BackendPreference::X11), vec![BackendKind::X11]);
            assert!(candidates(BackendPreference::Win32).is_empty());
        }
    }

    #[test]
    fn test_unavailable_preference_is_no_backend() {
        let forced = if cfg!(windows) {
            BackendPreference::Wayland
        } else {
            BackendPreference::Win32
        };
        match open(forced) {
            Err(Error::NoBackend(reason)) => assert!(reason.contains("not available")),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("backend opened on the wrong platform"),
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(BackendKind::Wayland.to_string(), "wayland");
        assert_eq!(BackendKind::Win32.to_string(), "win32");
    }
}
