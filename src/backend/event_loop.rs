//! Event loop integration
//!
//! A thin calloop wrapper used to poll native file descriptors (the Wayland
//! connection) without blocking the caller's render loop.

use std::time::Duration;

use calloop::{EventLoop as CalLoop, LoopHandle};
use log::debug;

use crate::error::{Error, Result};

fn loop_error(err: calloop::Error) -> Error {
    Error::Io(std::io::Error::other(err))
}

/// glwm event loop wrapper, generic over the data passed to sources
pub struct EventLoop<D: 'static> {
    event_loop: CalLoop<'static, D>,
}

impl<D: 'static> EventLoop<D> {
    /// Create a new event loop
    pub fn new() -> Result<Self> {
        let event_loop = CalLoop::try_new().map_err(loop_error)?;
        debug!("Created event loop");

        Ok(Self { event_loop })
    }

    /// Get a handle to register event sources
    pub fn handle(&self) -> LoopHandle<'static, D> {
        self.event_loop.handle()
    }

    /// Run one iteration of the event loop
    ///
    /// `Some(Duration::ZERO)` only processes sources that are already ready.
    pub fn dispatch(&mut self, timeout: Option<Duration>, data: &mut D) -> Result<()> {
        self.event_loop.dispatch(timeout, data).map_err(loop_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calloop::ping::make_ping;

    #[test]
    fn test_event_loop_new() {
        let event_loop = EventLoop::<()>::new();
        assert!(event_loop.is_ok());
    }

    #[test]
    fn test_event_loop_dispatch() {
        let mut event_loop = EventLoop::<()>::new().unwrap();
        // Dispatch with zero timeout should return immediately
        let result = event_loop.dispatch(Some(Duration::ZERO), &mut ());
        assert!(result.is_ok());
    }

    #[test]
    fn test_ready_source_sets_data() {
        let mut event_loop = EventLoop::<bool>::new().unwrap();
        let (ping, source) = make_ping().unwrap();
        event_loop
            .handle()
            .insert_source(source, |_, _, fired: &mut bool| *fired = true)
            .unwrap();

        let mut fired = false;
        event_loop
            .dispatch(Some(Duration::ZERO), &mut fired)
            .unwrap();
        assert!(!fired);

        ping.ping();
        event_loop
            .dispatch(Some(Duration::ZERO), &mut fired)
            .unwrap();
        assert!(fired);
    }
}
