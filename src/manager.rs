//! Window manager facade
//!
//! [`WindowManager`] ties a platform [`Backend`] to the shared GL context and
//! the window table, and turns backend events into callback invocations.
//!
//! Callbacks receive the manager itself, so they may create or destroy
//! windows, swap buffers or register other callbacks while an event batch
//! is being dispatched.

use std::collections::VecDeque;
use std::ffi::c_void;

use log::{debug, error, info, trace, warn};
use raw_window_handle::RawWindowHandle;

use crate::backend::{self, Backend, BackendKind};
use crate::config::Config;
use crate::context::{GlContext, RenderContext};
use crate::error::{Error, Result};
use crate::event::{CursorKind, Event, MouseButton, ScrollInfo, TouchInfo, WindowId};
use crate::logger::{self, RingLogger};
use crate::window::{WindowRecord, WindowTable};

type WindowCallback = Box<dyn FnMut(&mut WindowManager, WindowId)>;
type PositionCallback = Box<dyn FnMut(&mut WindowManager, WindowId, f64, f64)>;
type ButtonCallback = Box<dyn FnMut(&mut WindowManager, WindowId, MouseButton, bool)>;
type ScrollCallback = Box<dyn FnMut(&mut WindowManager, WindowId, ScrollInfo)>;
type KeyCallback = Box<dyn FnMut(&mut WindowManager, WindowId, bool, &str, u32)>;
type TouchCallback = Box<dyn FnMut(&mut WindowManager, WindowId, TouchInfo)>;
type DropCallback = Box<dyn FnMut(&mut WindowManager, WindowId, &str, &str, i32, i32)>;
type ResizeCallback = Box<dyn FnMut(&mut WindowManager, WindowId, u32, u32)>;
type ClipboardCallback = Box<dyn FnMut(&mut WindowManager)>;

#[derive(Default)]
struct Callbacks {
    mouse_enter: Option<PositionCallback>,
    mouse_leave: Option<WindowCallback>,
    mouse_move: Option<PositionCallback>,
    mouse_click: Option<ButtonCallback>,
    scroll: Option<ScrollCallback>,
    keyboard_enter: Option<WindowCallback>,
    keyboard_leave: Option<WindowCallback>,
    keyboard: Option<KeyCallback>,
    touch: Option<TouchCallback>,
    drag_n_drop: Option<DropCallback>,
    resize: Option<ResizeCallback>,
    frame_update: Option<WindowCallback>,
    close: Option<WindowCallback>,
    clipboard_changed: Option<ClipboardCallback>,
}

/// Run the callback in `slot` with the manager lent to it
///
/// The callback is taken out for the call; a replacement registered from
/// inside the callback wins over the original.
macro_rules! invoke {
    ($manager:ident, $slot:ident $(, $arg:expr)*) => {
        if let Some(mut callback) = $manager.callbacks.$slot.take() {
            callback($manager $(, $arg)*);
            if $manager.callbacks.$slot.is_none() {
                $manager.callbacks.$slot = Some(callback);
            }
        }
    };
}

/// Windows, their GL surfaces and the input callbacks of one application
pub struct WindowManager {
    /// Declared first: surfaces go before the native windows
    context: Box<dyn RenderContext>,
    windows: WindowTable,
    backend: Box<dyn Backend>,
    callbacks: Callbacks,
    queue: VecDeque<Event>,
    config: Config,
    /// Receives swap timings when `Config::time_swaps` is set
    swap_timer: Option<&'static RingLogger>,
}

impl WindowManager {
    /// Open the display with the configuration from the environment
    pub fn new() -> Result<Self> {
        Self::with_config(Config::from_env())
    }

    /// Open the display described by `config`
    ///
    /// No GL context exists until the first window is created.
    pub fn with_config(config: Config) -> Result<Self> {
        let backend = backend::open(config.backend)?;
        let context = Box::new(GlContext::new(config.gl_version, config.swap_interval));
        let mut manager = Self::with_parts(backend, context, config);
        if manager.config.time_swaps {
            manager.swap_timer = logger::get();
        }

        let cursor = manager.config.default_cursor;
        if let Err(e) = manager.backend.set_cursor(cursor) {
            warn!("Failed to apply default cursor {:?}: {}", cursor, e);
        }

        info!("Window manager ready on {}", manager.backend.kind());
        Ok(manager)
    }

    pub(crate) fn with_parts(
        backend: Box<dyn Backend>,
        context: Box<dyn RenderContext>,
        config: Config,
    ) -> Self {
        Self {
            context,
            windows: WindowTable::new(),
            backend,
            callbacks: Callbacks::default(),
            queue: VecDeque::new(),
            config,
            swap_timer: None,
        }
    }

    /// The platform this manager talks to
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn check(&self, id: WindowId, operation: &str) -> Result<()> {
        if self.windows.contains(id) {
            Ok(())
        } else {
            error!("{}: unknown window {:?}", operation, id);
            Err(Error::UnknownWindow(id))
        }
    }

    /// Create a native window with its own GL surface
    ///
    /// The first window creates the GL context and makes it current.
    pub fn create_window(&mut self, title: &str, width: u32, height: u32) -> Result<WindowId> {
        let id = self.windows.next_id();
        let (width, height) = self.backend.create_window(id, title, width, height)?;

        let attached = self
            .backend
            .raw_display_handle()
            .and_then(|display| Ok((display, self.backend.raw_window_handle(id)?)))
            .and_then(|(display, window)| {
                self.context.attach(id, display, window, width, height)
            });
        if let Err(e) = attached {
            error!("Failed to attach GL surface to {:?}: {}", id, e);
            if let Err(e) = self.backend.destroy_window(id) {
                warn!("Failed to destroy {:?} after attach failure: {}", id, e);
            }
            return Err(e);
        }

        let inserted = self.windows.insert(WindowRecord::new(title, width, height));
        debug_assert_eq!(inserted, id);
        info!("Window {:?} '{}' created ({}x{})", id, title, width, height);
        Ok(id)
    }

    /// Destroy a window and its surface
    ///
    /// Events already queued for it are dropped.
    pub fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        self.check(id, "destroy_window")?;

        self.context.detach(id);
        let result = self.backend.destroy_window(id);
        self.windows.remove(id);
        self.queue.retain(|event| event.window() != Some(id));

        info!("Window {:?} destroyed", id);
        result
    }

    /// Number of live windows
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Live window ids in creation order
    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.ids()
    }

    pub fn window_dimensions(&self, id: WindowId) -> Result<(u32, u32)> {
        self.check(id, "window_dimensions")?;
        Ok(self
            .windows
            .get(id)
            .map(|record| (record.width, record.height))
            .or_else(|| self.backend.window_size(id))
            .unwrap_or_default())
    }

    pub fn window_title(&self, id: WindowId) -> Result<&str> {
        self.check(id, "window_title")?;
        Ok(self
            .windows
            .get(id)
            .map(|record| record.title.as_str())
            .unwrap_or_default())
    }

    pub fn set_window_title(&mut self, id: WindowId, title: &str) -> Result<()> {
        self.check(id, "set_window_title")?;
        self.backend.set_title(id, title)?;
        if let Some(record) = self.windows.get_mut(id) {
            record.title = title.to_string();
        }
        Ok(())
    }

    /// Allow or forbid interactive resizing
    pub fn set_window_resizable(&mut self, id: WindowId, resizable: bool) -> Result<()> {
        self.check(id, "set_window_resizable")?;
        self.backend.set_resizable(id, resizable)?;
        if let Some(record) = self.windows.get_mut(id) {
            record.resizable = resizable;
        }
        Ok(())
    }

    /// Show or hide the window frame
    pub fn set_window_decorations(&mut self, id: WindowId, decorated: bool) -> Result<()> {
        self.check(id, "set_window_decorations")?;
        self.backend.set_decorations(id, decorated)?;
        if let Some(record) = self.windows.get_mut(id) {
            record.decorated = decorated;
        }
        Ok(())
    }

    /// Whether the window currently has keyboard focus
    pub fn window_is_focused(&self, id: WindowId) -> bool {
        self.windows.focused() == Some(id)
    }

    /// Bind the shared GL context to the window's surface
    pub fn make_context_current(&mut self, id: WindowId) -> Result<()> {
        self.check(id, "make_context_current")?;
        self.context.make_current(id)
    }

    pub fn swap_buffers(&mut self, id: WindowId) -> Result<()> {
        self.check(id, "swap_buffers")?;
        match self.swap_timer {
            Some(logger) => logger.time("swap_buffers", || self.context.swap_buffers(id)),
            None => self.context.swap_buffers(id),
        }
    }

    /// Swap interval for every current and future window
    pub fn set_swap_interval(&mut self, interval: u32) -> Result<()> {
        self.config.swap_interval = interval;
        self.context.set_swap_interval(interval)
    }

    /// Address of a GL entry point; null before the first window exists
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        self.context.get_proc_address(name)
    }

    /// Ask for a frame; the frame update callback follows
    pub fn window_update(&mut self, id: WindowId) -> Result<()> {
        self.check(id, "window_update")?;
        self.backend.request_frame(id)
    }

    /// Instantaneous frame rate, measured between consecutive calls
    ///
    /// Call once per rendered frame; the first call returns `0.0`.
    pub fn fps(&mut self, id: WindowId) -> Result<f64> {
        self.check(id, "fps")?;
        Ok(self
            .windows
            .get_mut(id)
            .map(|record| record.frame_clock.tick())
            .unwrap_or_default())
    }

    pub fn set_cursor(&mut self, cursor: CursorKind) -> Result<()> {
        self.config.default_cursor = cursor;
        self.backend.set_cursor(cursor)
    }

    /// Offer `text` as the clipboard selection
    pub fn attach_to_clipboard(&mut self, mime: &str, text: &str) -> Result<()> {
        self.backend.set_clipboard(mime, text)
    }

    /// Current clipboard text; may block briefly while another client
    /// transfers it
    pub fn clipboard_text(&mut self) -> Option<String> {
        self.backend.clipboard_text()
    }

    /// Register the drop callback and start dragging `data` out of `origin`
    pub fn start_drag_n_drop<F>(
        &mut self,
        origin: WindowId,
        mime: &str,
        data: &str,
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(&mut WindowManager, WindowId, &str, &str, i32, i32) + 'static,
    {
        self.check(origin, "start_drag_n_drop")?;
        self.callbacks.drag_n_drop = Some(Box::new(callback));
        self.backend.start_drag(origin, mime, data)
    }

    /// Native handle of the window, e.g. for other graphics APIs
    pub fn native_window_handle(&self, id: WindowId) -> Result<RawWindowHandle> {
        self.check(id, "native_window_handle")?;
        self.backend.raw_window_handle(id)
    }

    /// Pump native events and run the callbacks, without the close check
    pub fn poll_events(&mut self) {
        if let Err(e) = self.backend.pump_events(&mut self.queue) {
            error!("Failed to pump {} events: {}", self.backend.kind(), e);
        }
        while let Some(event) = self.queue.pop_front() {
            self.dispatch(event);
        }
    }

    /// Pump events, run callbacks and report whether the application is done
    ///
    /// Done means every created window has been destroyed or the display
    /// connection was lost. Always `false` before the first window.
    ///
    /// On X11 a lost connection is fatal: Xlib exits the process once its
    /// I/O error handler returns, so the loss is only logged there.
    pub fn should_close(&mut self) -> bool {
        self.poll_events();

        if self.backend.is_disconnected() {
            warn!("Display connection lost");
            return true;
        }
        self.windows.ever_created() && self.windows.is_empty()
    }

    fn dispatch(&mut self, event: Event) {
        if let Some(window) = event.window() {
            if !self.windows.contains(window) {
                trace!("Dropping event for gone window: {:?}", event);
                return;
            }
        }

        match event {
            Event::PointerEnter { window, x, y } => invoke!(self, mouse_enter, window, x, y),
            Event::PointerLeave { window } => invoke!(self, mouse_leave, window),
            Event::PointerMotion { window, x, y } => invoke!(self, mouse_move, window, x, y),
            Event::PointerButton {
                window,
                button,
                pressed,
            } => invoke!(self, mouse_click, window, button, pressed),
            Event::Scroll { window, scroll } => invoke!(self, scroll, window, scroll),
            Event::KeyboardEnter { window } => {
                self.windows.set_focused(Some(window));
                invoke!(self, keyboard_enter, window);
            }
            Event::KeyboardLeave { window } => {
                if self.windows.focused() == Some(window) {
                    self.windows.set_focused(None);
                }
                invoke!(self, keyboard_leave, window);
            }
            Event::Key {
                window,
                pressed,
                value,
                keycode,
            } => invoke!(self, keyboard, window, pressed, &value, keycode),
            Event::Touch { window, touch } => invoke!(self, touch, window, touch),
            Event::Resized {
                window,
                width,
                height,
            } => {
                if let Some(record) = self.windows.get_mut(window) {
                    record.width = width;
                    record.height = height;
                }
                if let Err(e) = self.context.resize(window, width, height) {
                    warn!("Failed to resize GL surface of {:?}: {}", window, e);
                }
                invoke!(self, resize, window, width, height);
            }
            Event::FrameUpdate { window } => invoke!(self, frame_update, window),
            Event::CloseRequested { window } => {
                if self.callbacks.close.is_some() {
                    invoke!(self, close, window);
                } else {
                    debug!("No close callback; destroying {:?}", window);
                    if let Err(e) = self.destroy_window(window) {
                        warn!("Failed to destroy {:?}: {}", window, e);
                    }
                }
            }
            Event::Drop {
                window,
                mime,
                data,
                x,
                y,
            } => invoke!(self, drag_n_drop, window, &mime, &data, x, y),
            Event::ClipboardChanged => invoke!(self, clipboard_changed),
        }
    }

    pub fn on_mouse_enter<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, f64, f64) + 'static,
    {
        self.callbacks.mouse_enter = Some(Box::new(callback));
    }

    pub fn on_mouse_leave<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId) + 'static,
    {
        self.callbacks.mouse_leave = Some(Box::new(callback));
    }

    pub fn on_mouse_move<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, f64, f64) + 'static,
    {
        self.callbacks.mouse_move = Some(Box::new(callback));
    }

    pub fn on_mouse_click<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, MouseButton, bool) + 'static,
    {
        self.callbacks.mouse_click = Some(Box::new(callback));
    }

    /// Scroll values are positive down or right, in surface pixels
    pub fn on_scroll<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, ScrollInfo) + 'static,
    {
        self.callbacks.scroll = Some(Box::new(callback));
    }

    pub fn on_keyboard_enter<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId) + 'static,
    {
        self.callbacks.keyboard_enter = Some(Box::new(callback));
    }

    pub fn on_keyboard_leave<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId) + 'static,
    {
        self.callbacks.keyboard_leave = Some(Box::new(callback));
    }

    /// Key callback: pressed, key value (text or unified name), evdev keycode
    pub fn on_keyboard<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, bool, &str, u32) + 'static,
    {
        self.callbacks.keyboard = Some(Box::new(callback));
    }

    pub fn on_touch<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, TouchInfo) + 'static,
    {
        self.callbacks.touch = Some(Box::new(callback));
    }

    /// Drop callback: mime type, data, drop position
    pub fn on_drag_n_drop<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, &str, &str, i32, i32) + 'static,
    {
        self.callbacks.drag_n_drop = Some(Box::new(callback));
    }

    /// Runs after the window's GL surface has been resized
    pub fn on_resize<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId, u32, u32) + 'static,
    {
        self.callbacks.resize = Some(Box::new(callback));
    }

    pub fn on_frame_update<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId) + 'static,
    {
        self.callbacks.frame_update = Some(Box::new(callback));
    }

    /// With a close callback registered, closing a window is up to the
    /// application
    pub fn on_close<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager, WindowId) + 'static,
    {
        self.callbacks.close = Some(Box::new(callback));
    }

    /// Runs when another client takes over the clipboard
    pub fn on_clipboard_changed<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WindowManager) + 'static,
    {
        self.callbacks.clipboard_changed = Some(Box::new(callback));
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        let ids = self.windows.ids();
        for id in &ids {
            self.context.detach(*id);
        }
        for id in ids {
            if let Err(e) = self.backend.destroy_window(id) {
                warn!("Failed to destroy {:?} on shutdown: {}", id, e);
            }
            self.windows.remove(id);
        }
        debug!("Window manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use raw_window_handle::{RawDisplayHandle, XlibDisplayHandle, XlibWindowHandle};

    use crate::event::{ScrollAxis, ScrollSource};

    /// Calls seen by the mock backend and context, in order
    #[derive(Default)]
    struct Shared {
        log: Vec<String>,
        incoming: Vec<Event>,
        disconnected: bool,
        clipboard: Option<String>,
    }

    struct MockBackend {
        shared: Rc<RefCell<Shared>>,
        sizes: HashMap<WindowId, (u32, u32)>,
    }

    impl Backend for MockBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::X11
        }

        fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
            Ok(RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)))
        }

        fn raw_window_handle(&self, id: WindowId) -> Result<RawWindowHandle> {
            if !self.sizes.contains_key(&id) {
                return Err(Error::UnknownWindow(id));
            }
            Ok(RawWindowHandle::Xlib(XlibWindowHandle::new(id.0 as _)))
        }

        fn create_window(
            &mut self,
            id: WindowId,
            _title: &str,
            width: u32,
            height: u32,
        ) -> Result<(u32, u32)> {
            self.sizes.insert(id, (width, height));
            self.shared.borrow_mut().log.push(format!("create {}", id.0));
            Ok((width, height))
        }

        fn destroy_window(&mut self, id: WindowId) -> Result<()> {
            self.sizes.remove(&id).ok_or(Error::UnknownWindow(id))?;
            self.shared.borrow_mut().log.push(format!("destroy {}", id.0));
            Ok(())
        }

        fn window_size(&self, id: WindowId) -> Option<(u32, u32)> {
            self.sizes.get(&id).copied()
        }

        fn pump_events(&mut self, events: &mut VecDeque<Event>) -> Result<()> {
            events.extend(self.shared.borrow_mut().incoming.drain(..));
            Ok(())
        }

        fn request_frame(&mut self, id: WindowId) -> Result<()> {
            self.shared
                .borrow_mut()
                .incoming
                .push(Event::FrameUpdate { window: id });
            Ok(())
        }

        fn set_title(&mut self, _id: WindowId, _title: &str) -> Result<()> {
            Ok(())
        }

        fn set_resizable(&mut self, _id: WindowId, _resizable: bool) -> Result<()> {
            Ok(())
        }

        fn set_decorations(&mut self, _id: WindowId, _decorated: bool) -> Result<()> {
            Ok(())
        }

        fn set_cursor(&mut self, _cursor: CursorKind) -> Result<()> {
            Ok(())
        }

        fn set_clipboard(&mut self, _mime: &str, text: &str) -> Result<()> {
            self.shared.borrow_mut().clipboard = Some(text.to_string());
            Ok(())
        }

        fn clipboard_text(&mut self) -> Option<String> {
            self.shared.borrow().clipboard.clone()
        }

        fn start_drag(&mut self, id: WindowId, mime: &str, _data: &str) -> Result<()> {
            self.shared
                .borrow_mut()
                .log
                .push(format!("drag {} {}", id.0, mime));
            Ok(())
        }

        fn is_disconnected(&self) -> bool {
            self.shared.borrow().disconnected
        }
    }

    struct MockContext {
        shared: Rc<RefCell<Shared>>,
    }

    impl RenderContext for MockContext {
        fn attach(
            &mut self,
            id: WindowId,
            _display: RawDisplayHandle,
            _window: RawWindowHandle,
            _width: u32,
            _height: u32,
        ) -> Result<()> {
            self.shared.borrow_mut().log.push(format!("attach {}", id.0));
            Ok(())
        }

        fn detach(&mut self, id: WindowId) {
            self.shared.borrow_mut().log.push(format!("detach {}", id.0));
        }

        fn make_current(&mut self, _id: WindowId) -> Result<()> {
            Ok(())
        }

        fn swap_buffers(&mut self, id: WindowId) -> Result<()> {
            self.shared.borrow_mut().log.push(format!("swap {}", id.0));
            Ok(())
        }

        fn set_swap_interval(&mut self, _interval: u32) -> Result<()> {
            Ok(())
        }

        fn resize(&mut self, id: WindowId, width: u32, height: u32) -> Result<()> {
            self.shared
                .borrow_mut()
                .log
                .push(format!("resize {} {}x{}", id.0, width, height));
            Ok(())
        }

        fn get_proc_address(&self, _name: &str) -> *const c_void {
            std::ptr::null()
        }
    }

    fn manager() -> (WindowManager, Rc<RefCell<Shared>>) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        let backend = MockBackend {
            shared: shared.clone(),
            sizes: HashMap::new(),
        };
        let context = MockContext {
            shared: shared.clone(),
        };
        let manager =
            WindowManager::with_parts(Box::new(backend), Box::new(context), Config::default());
        (manager, shared)
    }

    fn push(shared: &Rc<RefCell<Shared>>, event: Event) {
        shared.borrow_mut().incoming.push(event);
    }

    #[test]
    fn test_should_close_lifecycle() {
        let (mut wm, _shared) = manager();
        assert!(!wm.should_close());

        let id = wm.create_window("main", 640, 480).unwrap();
        assert!(!wm.should_close());
        assert_eq!(wm.window_count(), 1);
        assert_eq!(wm.window_dimensions(id).unwrap(), (640, 480));

        wm.destroy_window(id).unwrap();
        assert!(wm.should_close());
    }

    #[test]
    fn test_window_ids_not_reused() {
        let (mut wm, _shared) = manager();
        let a = wm.create_window("a", 10, 10).unwrap();
        wm.destroy_window(a).unwrap();
        let b = wm.create_window("b", 10, 10).unwrap();
        assert_ne!(a, b);
        assert!(matches!(
            wm.destroy_window(a),
            Err(Error::UnknownWindow(id)) if id == a
        ));
    }

    #[test]
    fn test_create_attaches_and_destroy_detaches() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();
        wm.destroy_window(id).unwrap();
        assert_eq!(
            shared.borrow().log,
            vec!["create 0", "attach 0", "detach 0", "destroy 0"]
        );
    }

    #[test]
    fn test_resize_before_callback() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        let log = shared.clone();
        wm.on_resize(move |wm, window, width, height| {
            log.borrow_mut()
                .log
                .push(format!("callback {}x{}", width, height));
            assert_eq!(wm.window_dimensions(window).unwrap(), (width, height));
        });
        push(
            &shared,
            Event::Resized {
                window: id,
                width: 800,
                height: 600,
            },
        );
        wm.poll_events();

        let log = shared.borrow().log.clone();
        assert_eq!(log[log.len() - 2], "resize 0 800x600");
        assert_eq!(log[log.len() - 1], "callback 800x600");
    }

    #[test]
    fn test_events_for_destroyed_window_dropped() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        let clicks = Rc::new(RefCell::new(0));
        let counter = clicks.clone();
        wm.on_mouse_click(move |wm, window, _, _| {
            *counter.borrow_mut() += 1;
            wm.destroy_window(window).unwrap();
        });

        for pressed in [true, false] {
            push(
                &shared,
                Event::PointerButton {
                    window: id,
                    button: MouseButton::Left,
                    pressed,
                },
            );
        }
        assert!(wm.should_close());
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn test_close_without_callback_destroys() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();
        push(&shared, Event::CloseRequested { window: id });
        assert!(wm.should_close());
    }

    #[test]
    fn test_close_callback_decides() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        let closes = Rc::new(RefCell::new(Vec::new()));
        let seen = closes.clone();
        wm.on_close(move |_, window| seen.borrow_mut().push(window));

        push(&shared, Event::CloseRequested { window: id });
        assert!(!wm.should_close());
        assert_eq!(*closes.borrow(), vec![id]);
        assert_eq!(wm.window_count(), 1);
    }

    #[test]
    fn test_callback_replaced_from_inside() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let first = calls.clone();
        wm.on_frame_update(move |wm, _| {
            first.borrow_mut().push("first");
            let second = first.clone();
            wm.on_frame_update(move |_, _| second.borrow_mut().push("second"));
        });

        push(&shared, Event::FrameUpdate { window: id });
        push(&shared, Event::FrameUpdate { window: id });
        wm.poll_events();
        assert_eq!(*calls.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_keyboard_and_focus() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        let keys = Rc::new(RefCell::new(Vec::new()));
        let seen = keys.clone();
        wm.on_keyboard(move |_, _, pressed, value, keycode| {
            seen.borrow_mut().push((pressed, value.to_string(), keycode));
        });

        push(&shared, Event::KeyboardEnter { window: id });
        push(
            &shared,
            Event::Key {
                window: id,
                pressed: true,
                value: "Escape".to_string(),
                keycode: 1,
            },
        );
        wm.poll_events();
        assert!(wm.window_is_focused(id));
        assert_eq!(*keys.borrow(), vec![(true, "Escape".to_string(), 1)]);

        push(&shared, Event::KeyboardLeave { window: id });
        wm.poll_events();
        assert!(!wm.window_is_focused(id));
    }

    #[test]
    fn test_scroll_and_drop_callbacks() {
        let (mut wm, shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let scrolls = seen.clone();
        wm.on_scroll(move |_, _, scroll| {
            scrolls.borrow_mut().push(format!("scroll {}", scroll.value))
        });
        let drops = seen.clone();
        wm.start_drag_n_drop(id, "text/plain", "hello", move |_, _, mime, data, x, y| {
            drops
                .borrow_mut()
                .push(format!("drop {} {} {},{}", mime, data, x, y))
        })
        .unwrap();

        push(
            &shared,
            Event::Scroll {
                window: id,
                scroll: ScrollInfo {
                    axis: ScrollAxis::Vertical,
                    source: ScrollSource::Wheel,
                    value: 10.0,
                    discrete: Some(1),
                    stopped: false,
                },
            },
        );
        push(
            &shared,
            Event::Drop {
                window: id,
                mime: "text/plain".to_string(),
                data: "hello".to_string(),
                x: 3,
                y: 4,
            },
        );
        wm.poll_events();

        assert_eq!(
            *seen.borrow(),
            vec!["scroll 10", "drop text/plain hello 3,4"]
        );
        assert!(shared.borrow().log.contains(&"drag 0 text/plain".to_string()));
    }

    #[test]
    fn test_window_update_delivers_frame() {
        let (mut wm, _shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        let frames = Rc::new(RefCell::new(0));
        let counter = frames.clone();
        wm.on_frame_update(move |_, _| *counter.borrow_mut() += 1);

        wm.window_update(id).unwrap();
        wm.poll_events();
        assert_eq!(*frames.borrow(), 1);
    }

    #[test]
    fn test_disconnect_closes() {
        let (mut wm, shared) = manager();
        wm.create_window("a", 10, 10).unwrap();
        shared.borrow_mut().disconnected = true;
        assert!(wm.should_close());
    }

    #[test]
    fn test_fps_first_call_zero() {
        let (mut wm, _shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();
        assert_eq!(wm.fps(id).unwrap(), 0.0);
        assert!(wm.fps(WindowId(99)).is_err());
    }

    #[test]
    fn test_clipboard_round_trip() {
        let (mut wm, _shared) = manager();
        wm.attach_to_clipboard("text/plain", "copied").unwrap();
        assert_eq!(wm.clipboard_text().as_deref(), Some("copied"));
    }

    #[test]
    fn test_title_and_flags() {
        let (mut wm, _shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();
        wm.set_window_title(id, "renamed").unwrap();
        wm.set_window_resizable(id, false).unwrap();
        wm.set_window_decorations(id, false).unwrap();
        assert_eq!(wm.window_title(id).unwrap(), "renamed");
        assert!(wm.native_window_handle(id).is_ok());
        assert!(wm.set_window_title(WindowId(42), "x").is_err());
    }

    fn ring_logger(capacity: usize, level: log::LevelFilter) -> &'static RingLogger {
        let config = Config {
            log_capacity: capacity,
            log_filter: "off".to_string(),
            ..Config::default()
        };
        let logger: &'static RingLogger = Box::leak(Box::new(RingLogger::new(&config)));
        logger.set_min_level(level);
        logger
    }

    fn log_error(logger: &RingLogger, message: &str) {
        use log::Log;
        logger.log(
            &log::Record::builder()
                .args(format_args!("{}", message))
                .level(log::Level::Error)
                .target("glwm")
                .build(),
        );
    }

    #[test]
    fn test_swaps_keep_diagnostics_in_ring() {
        let logger = ring_logger(16, log::LevelFilter::Info);
        log_error(logger, "surface lost");

        let (mut wm, _shared) = manager();
        wm.swap_timer = Some(logger);
        let id = wm.create_window("a", 10, 10).unwrap();
        for _ in 0..20 {
            wm.swap_buffers(id).unwrap();
        }

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("surface lost"));
    }

    #[test]
    fn test_swap_timing_recorded_at_debug() {
        let logger = ring_logger(16, log::LevelFilter::Debug);
        let (mut wm, _shared) = manager();
        let id = wm.create_window("a", 10, 10).unwrap();

        wm.swap_buffers(id).unwrap();
        assert!(logger.entries().is_empty());

        wm.swap_timer = Some(logger);
        wm.swap_buffers(id).unwrap();
        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("METRICS: swap_buffers took"));
    }

    #[test]
    fn test_drop_releases_surfaces_before_windows() {
        let (mut wm, shared) = manager();
        wm.create_window("a", 10, 10).unwrap();
        wm.create_window("b", 10, 10).unwrap();
        drop(wm);

        let log = shared.borrow().log.clone();
        assert_eq!(
            &log[4..],
            &["detach 0", "detach 1", "destroy 0", "destroy 1"]
        );
    }
}
