//! Error type shared by the facade and every backend

use crate::event::WindowId;

/// Errors reported by glwm
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No platform backend could be opened; holds the reason of every attempt
    #[error("no usable windowing backend: {0}")]
    NoBackend(String),
    /// Connecting to the display server failed
    #[error("failed to connect to display: {0}")]
    Connect(String),
    /// A Wayland protocol or dispatch failure
    #[error("wayland: {0}")]
    Wayland(String),
    /// An Xlib failure
    #[error("x11: {0}")]
    X11(String),
    /// A Win32 API failure
    #[error("win32: {0}")]
    Win32(String),
    /// EGL / WGL context failure
    #[error("gl context: {0}")]
    Context(String),
    /// The window id is not (or no longer) managed
    #[error("unknown window {0:?}")]
    UnknownWindow(WindowId),
    /// Clipboard access failed
    #[error("clipboard: {0}")]
    Clipboard(String),
    /// `logger::init` was called twice or another logger is installed
    #[error("a global logger is already installed")]
    LoggerAlreadySet,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl From<glutin::error::Error> for Error {
    fn from(err: glutin::error::Error) -> Self {
        Error::Context(err.to_string())
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl From<wayland_client::ConnectError> for Error {
    fn from(err: wayland_client::ConnectError) -> Self {
        Error::Connect(err.to_string())
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl From<wayland_client::DispatchError> for Error {
    fn from(err: wayland_client::DispatchError) -> Self {
        Error::Wayland(err.to_string())
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl From<wayland_client::backend::WaylandError> for Error {
    fn from(err: wayland_client::backend::WaylandError) -> Self {
        Error::Wayland(err.to_string())
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for Error {
    fn from(err: windows::core::Error) -> Self {
        Error::Win32(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_window_message() {
        let err = Error::UnknownWindow(WindowId(7));
        assert_eq!(err.to_string(), "unknown window WindowId(7)");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
