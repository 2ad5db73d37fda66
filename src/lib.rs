//! glwm - native windows with OpenGL contexts and unified input
//!
//! glwm opens Wayland, X11 or Win32 windows, gives each one an OpenGL
//! surface on a shared context, and reports input from every platform
//! through one set of callbacks.
//!
//! # Architecture
//!
//! - **Backends**: Wayland (xdg-shell), X11 (Xlib) and Win32, behind the
//!   [`backend::Backend`] trait
//! - **Input**: platform-neutral key, pointer, scroll and clipboard helpers
//! - **Context**: EGL / WGL through glutin, one surface per window
//! - **Manager**: [`WindowManager`] dispatches backend events to callbacks
//! - **Logger**: [`logger::RingLogger`] keeps recent log lines in memory
//!
//! # Example
//!
//! ```no_run
//! use glwm::{Config, WindowManager};
//!
//! let config = Config::from_env();
//! glwm::logger::init(&config)?;
//!
//! let mut wm = WindowManager::with_config(config)?;
//! let window = wm.create_window("glwm", 640, 480)?;
//! wm.on_frame_update(|wm, window| {
//!     let _ = wm.swap_buffers(window);
//!     let _ = wm.window_update(window);
//! });
//! wm.window_update(window)?;
//!
//! while !wm.should_close() {}
//! # Ok::<(), glwm::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod input;
pub mod logger;
pub mod manager;
pub mod window;

pub use backend::BackendKind;
pub use config::{BackendPreference, Config};
pub use error::{Error, Result};
pub use event::{
    CursorKind, Event, MouseButton, ScrollAxis, ScrollInfo, ScrollSource, TouchInfo, WindowId,
    LINE_SCROLL_PIXELS,
};
pub use logger::RingLogger;
pub use manager::WindowManager;
