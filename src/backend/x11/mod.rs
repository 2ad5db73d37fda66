//! X11 backend
//!
//! Uses Xlib loaded at runtime through `x11-dl`. A hidden helper window owns
//! the CLIPBOARD selection and receives conversion results.

mod translate;

use std::collections::{HashMap, VecDeque};
use std::ffi::{c_char, c_int, c_long, c_uchar, c_ulong, c_void, CStr, CString};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};
use x11_dl::xlib;

use self::translate::{cursor_shape, is_repeat_pair, map_button, motif_hints, ButtonAction};
use super::{Backend, BackendKind};
use crate::error::{Error, Result};
use crate::event::{CursorKind, Event, ScrollSource, WindowId};
use crate::input::clipboard::{Clipboard, Payload, TEXT_MIME_TYPES};
use crate::input::keyboard::{key_value, named_key};
use crate::input::pointer::scroll_from_notches;
use crate::input::{KeyTracker, PointerTracker};

/// How long to wait for another client to convert the selection
const SELECTION_TIMEOUT: Duration = Duration::from_millis(500);

const EVENT_MASK: c_long = xlib::KeyPressMask
    | xlib::KeyReleaseMask
    | xlib::ButtonPressMask
    | xlib::ButtonReleaseMask
    | xlib::PointerMotionMask
    | xlib::EnterWindowMask
    | xlib::LeaveWindowMask
    | xlib::FocusChangeMask
    | xlib::StructureNotifyMask
    | xlib::ExposureMask;

/// Interned atoms
struct Atoms {
    wm_protocols: xlib::Atom,
    wm_delete_window: xlib::Atom,
    motif_wm_hints: xlib::Atom,
    clipboard: xlib::Atom,
    targets: xlib::Atom,
    utf8_string: xlib::Atom,
    selection_property: xlib::Atom,
    /// Text targets we can serve, with the mime type each stands for
    text_targets: Vec<(xlib::Atom, &'static str)>,
}

impl Atoms {
    fn intern(xlib: &xlib::Xlib, display: *mut xlib::Display) -> Result<Self> {
        let intern = |name: &str| -> Result<xlib::Atom> {
            let name = CString::new(name).map_err(|e| Error::X11(e.to_string()))?;
            Ok(unsafe { (xlib.XInternAtom)(display, name.as_ptr(), xlib::False) })
        };

        let mut text_targets = Vec::with_capacity(TEXT_MIME_TYPES.len());
        for mime in TEXT_MIME_TYPES {
            text_targets.push((intern(mime)?, mime));
        }

        Ok(Self {
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
            clipboard: intern("CLIPBOARD")?,
            targets: intern("TARGETS")?,
            utf8_string: intern("UTF8_STRING")?,
            selection_property: intern("GLWM_SELECTION")?,
            text_targets,
        })
    }

    fn mime_for(&self, target: xlib::Atom) -> Option<&'static str> {
        self.text_targets
            .iter()
            .find(|(atom, _)| *atom == target)
            .map(|(_, mime)| *mime)
    }
}

struct X11Window {
    window: xlib::Window,
    width: u32,
    height: u32,
}

unsafe extern "C" fn log_x_error(
    _display: *mut xlib::Display,
    event: *mut xlib::XErrorEvent,
) -> c_int {
    if let Some(event) = unsafe { event.as_ref() } {
        warn!(
            "X error: code {} request {}.{} resource {:#x}",
            event.error_code, event.request_code, event.minor_code, event.resourceid
        );
    }
    0
}

/// Set once Xlib reports a fatal I/O error
static CONNECTION_LOST: AtomicBool = AtomicBool::new(false);

/// Xlib exits the process when this returns, so the loss is logged and
/// the log flushed first
unsafe extern "C" fn record_io_error(_display: *mut xlib::Display) -> c_int {
    CONNECTION_LOST.store(true, Ordering::SeqCst);
    error!("Lost connection to the X server");
    log::logger().flush();
    0
}

/// Connection to an X server
pub struct X11Backend {
    xlib: xlib::Xlib,
    display: NonNull<xlib::Display>,
    screen: c_int,
    atoms: Atoms,
    /// Unmapped window owning the clipboard selection
    helper: xlib::Window,
    windows: HashMap<WindowId, X11Window>,
    by_native: HashMap<xlib::Window, WindowId>,
    cursors: HashMap<CursorKind, xlib::Cursor>,
    cursor: CursorKind,
    pointer: PointerTracker,
    keys: KeyTracker,
    clipboard: Clipboard,
    /// The server marks auto-repeat presses instead of pairing them with
    /// synthetic releases
    detectable_repeat: bool,
    /// Events produced outside `pump_events`
    pending: Vec<Event>,
}

impl X11Backend {
    /// Open `$DISPLAY`
    pub fn connect() -> Result<Self> {
        let xlib = xlib::Xlib::open().map_err(|e| Error::Connect(e.to_string()))?;
        let display = NonNull::new(unsafe { (xlib.XOpenDisplay)(ptr::null()) })
            .ok_or_else(|| Error::Connect("XOpenDisplay failed".into()))?;
        let dpy = display.as_ptr();

        unsafe {
            (xlib.XSetErrorHandler)(Some(log_x_error));
            (xlib.XSetIOErrorHandler)(Some(record_io_error));
        }

        let screen = unsafe { (xlib.XDefaultScreen)(dpy) };
        let atoms = Atoms::intern(&xlib, dpy)?;

        let mut supported = xlib::False;
        unsafe { (xlib.XkbSetDetectableAutoRepeat)(dpy, xlib::True, &mut supported) };
        let detectable_repeat = supported != xlib::False;
        if !detectable_repeat {
            debug!("Detectable auto-repeat unavailable; dropping release/press repeat pairs");
        }

        let helper = unsafe {
            let root = (xlib.XRootWindow)(dpy, screen);
            let helper = (xlib.XCreateSimpleWindow)(dpy, root, 0, 0, 1, 1, 0, 0, 0);
            (xlib.XSelectInput)(dpy, helper, xlib::PropertyChangeMask);
            helper
        };

        info!("Connected to X server (screen {})", screen);

        Ok(Self {
            xlib,
            display,
            screen,
            atoms,
            helper,
            windows: HashMap::new(),
            by_native: HashMap::new(),
            cursors: HashMap::new(),
            cursor: CursorKind::default(),
            pointer: PointerTracker::new(),
            keys: KeyTracker::new(),
            clipboard: Clipboard::new(),
            detectable_repeat,
            pending: Vec::new(),
        })
    }

    fn dpy(&self) -> *mut xlib::Display {
        self.display.as_ptr()
    }

    fn window(&self, id: WindowId) -> Result<&X11Window> {
        self.windows.get(&id).ok_or(Error::UnknownWindow(id))
    }

    fn flush(&self) {
        unsafe { (self.xlib.XFlush)(self.dpy()) };
    }

    fn font_cursor(&mut self, kind: CursorKind) -> xlib::Cursor {
        if let Some(cursor) = self.cursors.get(&kind) {
            return *cursor;
        }
        let cursor = unsafe { (self.xlib.XCreateFontCursor)(self.dpy(), cursor_shape(kind)) };
        self.cursors.insert(kind, cursor);
        cursor
    }

    fn set_size_hints(&self, window: &X11Window, resizable: bool) {
        let mut hints: xlib::XSizeHints = unsafe { std::mem::zeroed() };
        if !resizable {
            hints.flags = xlib::PMinSize | xlib::PMaxSize;
            hints.min_width = window.width as c_int;
            hints.max_width = window.width as c_int;
            hints.min_height = window.height as c_int;
            hints.max_height = window.height as c_int;
        }
        unsafe { (self.xlib.XSetWMNormalHints)(self.dpy(), window.window, &mut hints) };
    }

    /// Whether the next queued event is the press half of an auto-repeat
    fn release_is_repeat(&self, release: &xlib::XKeyEvent) -> bool {
        let dpy = self.dpy();
        if unsafe { (self.xlib.XPending)(dpy) } == 0 {
            return false;
        }
        let mut next: xlib::XEvent = unsafe { std::mem::zeroed() };
        unsafe { (self.xlib.XPeekEvent)(dpy, &mut next) };
        next.get_type() == xlib::KeyPress
            && is_repeat_pair(release, &xlib::XKeyEvent::from(next))
    }

    fn translate(&mut self, event: xlib::XEvent, out: &mut VecDeque<Event>) {
        let kind = event.get_type();
        let any = xlib::XAnyEvent::from(event);

        match kind {
            xlib::SelectionRequest => return self.answer_selection_request(event),
            xlib::SelectionClear => {
                if self.clipboard.lost() {
                    out.push_back(Event::ClipboardChanged);
                }
                return;
            }
            _ => {}
        }

        let Some(&window) = self.by_native.get(&any.window) else {
            return;
        };

        match kind {
            xlib::KeyPress | xlib::KeyRelease => {
                let mut key = xlib::XKeyEvent::from(event);
                let pressed = kind == xlib::KeyPress;
                let keycode = key.keycode.saturating_sub(8);

                if !pressed && !self.detectable_repeat && self.release_is_repeat(&key) {
                    return;
                }

                let fresh = if pressed {
                    self.keys.press(keycode)
                } else {
                    self.keys.release(keycode)
                };
                if !fresh {
                    return;
                }

                let mut buffer = [0 as c_char; 32];
                let mut keysym: xlib::KeySym = 0;
                let len = unsafe {
                    (self.xlib.XLookupString)(
                        &mut key,
                        buffer.as_mut_ptr(),
                        buffer.len() as c_int,
                        &mut keysym,
                        ptr::null_mut(),
                    )
                };
                // XLookupString produces Latin-1
                let text: String = buffer[..len.max(0) as usize]
                    .iter()
                    .map(|&b| b as u8 as char)
                    .collect();
                let name = unsafe {
                    let name = (self.xlib.XKeysymToString)(keysym);
                    if name.is_null() {
                        String::new()
                    } else {
                        CStr::from_ptr(name).to_string_lossy().into_owned()
                    }
                };

                out.push_back(Event::Key {
                    window,
                    pressed,
                    value: key_value(&text, named_key(keysym as u32), &name),
                    keycode,
                });
            }
            xlib::ButtonPress | xlib::ButtonRelease => {
                let button = xlib::XButtonEvent::from(event);
                let pressed = kind == xlib::ButtonPress;
                match map_button(button.button) {
                    ButtonAction::Button(button) => {
                        if let Some(event) = self.pointer.button(window, button, pressed) {
                            out.push_back(event);
                        }
                    }
                    // The release of a wheel "button" carries no information
                    ButtonAction::Scroll(axis, notches) if pressed => {
                        out.push_back(Event::Scroll {
                            window,
                            scroll: scroll_from_notches(axis, notches, ScrollSource::Wheel),
                        });
                    }
                    ButtonAction::Scroll(..) => {}
                }
            }
            xlib::MotionNotify => {
                let motion = xlib::XMotionEvent::from(event);
                out.extend(
                    self.pointer
                        .motion(window, motion.x as f64, motion.y as f64),
                );
            }
            xlib::EnterNotify => {
                let crossing = xlib::XCrossingEvent::from(event);
                out.extend(
                    self.pointer
                        .enter(window, crossing.x as f64, crossing.y as f64),
                );
            }
            xlib::LeaveNotify => {
                if let Some(event) = self.pointer.leave(window) {
                    out.push_back(event);
                }
            }
            xlib::FocusIn => {
                if self.keys.set_focus(Some(window)) != Some(window) {
                    out.push_back(Event::KeyboardEnter { window });
                }
            }
            xlib::FocusOut => {
                if self.keys.focus() == Some(window) {
                    self.keys.set_focus(None);
                    out.push_back(Event::KeyboardLeave { window });
                }
            }
            xlib::ConfigureNotify => {
                let configure = xlib::XConfigureEvent::from(event);
                let (width, height) = (configure.width as u32, configure.height as u32);
                if let Some(native) = self.windows.get_mut(&window) {
                    if (native.width, native.height) != (width, height) {
                        native.width = width;
                        native.height = height;
                        out.push_back(Event::Resized {
                            window,
                            width,
                            height,
                        });
                    }
                }
            }
            xlib::Expose => {
                let expose = xlib::XExposeEvent::from(event);
                if expose.count == 0 {
                    out.push_back(Event::FrameUpdate { window });
                }
            }
            xlib::ClientMessage => {
                let message = xlib::XClientMessageEvent::from(event);
                if message.message_type == self.atoms.wm_protocols
                    && message.data.get_long(0) as xlib::Atom == self.atoms.wm_delete_window
                {
                    debug!("Close requested for {:?}", window);
                    out.push_back(Event::CloseRequested { window });
                }
            }
            _ => {}
        }
    }

    fn answer_selection_request(&mut self, event: xlib::XEvent) {
        let request = xlib::XSelectionRequestEvent::from(event);
        let dpy = self.dpy();

        let mut property = request.property;
        if property == 0 {
            // Obsolete requestors leave the property unset
            property = request.target;
        }

        let served = if request.selection != self.atoms.clipboard {
            false
        } else if request.target == self.atoms.targets {
            let mut targets: Vec<c_ulong> = vec![self.atoms.targets];
            targets.extend(self.atoms.text_targets.iter().map(|(atom, _)| *atom));
            unsafe {
                (self.xlib.XChangeProperty)(
                    dpy,
                    request.requestor,
                    property,
                    xlib::XA_ATOM,
                    32,
                    xlib::PropModeReplace,
                    targets.as_ptr() as *const c_uchar,
                    targets.len() as c_int,
                );
            }
            true
        } else {
            let data = self
                .atoms
                .mime_for(request.target)
                .and_then(|mime| self.clipboard.serve(mime));
            match data {
                Some(text) => {
                    unsafe {
                        (self.xlib.XChangeProperty)(
                            dpy,
                            request.requestor,
                            property,
                            request.target,
                            8,
                            xlib::PropModeReplace,
                            text.as_ptr(),
                            text.len() as c_int,
                        );
                    }
                    true
                }
                None => false,
            }
        };

        let mut notify = xlib::XSelectionEvent {
            type_: xlib::SelectionNotify,
            serial: 0,
            send_event: xlib::True,
            display: dpy,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property: if served { property } else { 0 },
            time: request.time,
        };
        unsafe {
            (self.xlib.XSendEvent)(
                dpy,
                request.requestor,
                xlib::False,
                xlib::NoEventMask,
                &mut notify as *mut xlib::XSelectionEvent as *mut xlib::XEvent,
            );
        }
        self.flush();
    }

    /// Convert the CLIPBOARD selection to UTF-8 text on the helper window
    fn read_selection(&mut self) -> Result<Option<String>> {
        let dpy = self.dpy();
        let owner = unsafe { (self.xlib.XGetSelectionOwner)(dpy, self.atoms.clipboard) };
        if owner == 0 {
            return Ok(None);
        }

        unsafe {
            (self.xlib.XConvertSelection)(
                dpy,
                self.atoms.clipboard,
                self.atoms.utf8_string,
                self.atoms.selection_property,
                self.helper,
                xlib::CurrentTime,
            );
        }
        self.flush();

        let deadline = Instant::now() + SELECTION_TIMEOUT;
        let mut event: xlib::XEvent = unsafe { std::mem::zeroed() };
        loop {
            let found = unsafe {
                (self.xlib.XCheckTypedWindowEvent)(
                    dpy,
                    self.helper,
                    xlib::SelectionNotify,
                    &mut event,
                )
            };
            if found != 0 {
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::Clipboard("selection owner did not respond".into()));
            }
            thread::sleep(Duration::from_millis(5));
        }

        let notify = xlib::XSelectionEvent::from(event);
        if notify.property == 0 {
            return Ok(None);
        }

        let mut actual_type: xlib::Atom = 0;
        let mut actual_format: c_int = 0;
        let mut items: c_ulong = 0;
        let mut remaining: c_ulong = 0;
        let mut data: *mut c_uchar = ptr::null_mut();
        let status = unsafe {
            (self.xlib.XGetWindowProperty)(
                dpy,
                self.helper,
                self.atoms.selection_property,
                0,
                c_long::MAX / 4,
                xlib::True,
                xlib::AnyPropertyType as xlib::Atom,
                &mut actual_type,
                &mut actual_format,
                &mut items,
                &mut remaining,
                &mut data,
            )
        };
        if status != xlib::Success as c_int || data.is_null() {
            return Err(Error::Clipboard("could not read selection property".into()));
        }

        let bytes = unsafe { std::slice::from_raw_parts(data, items as usize) }.to_vec();
        unsafe { (self.xlib.XFree)(data as *mut c_void) };

        if actual_format != 8 {
            return Err(Error::Clipboard(format!(
                "unsupported selection format {}",
                actual_format
            )));
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl Backend for X11Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::X11
    }

    fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        Ok(RawDisplayHandle::Xlib(XlibDisplayHandle::new(
            Some(self.display.cast()),
            self.screen,
        )))
    }

    fn raw_window_handle(&self, id: WindowId) -> Result<RawWindowHandle> {
        let window = self.window(id)?;
        Ok(RawWindowHandle::Xlib(XlibWindowHandle::new(window.window)))
    }

    fn create_window(
        &mut self,
        id: WindowId,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32)> {
        let dpy = self.dpy();
        let title = CString::new(title).map_err(|e| Error::X11(e.to_string()))?;

        let window = unsafe {
            let root = (self.xlib.XRootWindow)(dpy, self.screen);
            let black = (self.xlib.XBlackPixel)(dpy, self.screen);
            let window = (self.xlib.XCreateSimpleWindow)(
                dpy,
                root,
                0,
                0,
                width.max(1),
                height.max(1),
                0,
                black,
                black,
            );
            if window == 0 {
                return Err(Error::X11("XCreateSimpleWindow failed".into()));
            }

            (self.xlib.XSelectInput)(dpy, window, EVENT_MASK);
            (self.xlib.XStoreName)(dpy, window, title.as_ptr());

            let mut protocols = [self.atoms.wm_delete_window];
            (self.xlib.XSetWMProtocols)(dpy, window, protocols.as_mut_ptr(), 1);
            window
        };

        let cursor = self.font_cursor(self.cursor);
        unsafe {
            (self.xlib.XDefineCursor)(dpy, window, cursor);
            (self.xlib.XMapWindow)(dpy, window);
        }
        self.flush();

        self.windows.insert(
            id,
            X11Window {
                window,
                width,
                height,
            },
        );
        self.by_native.insert(window, id);

        info!("Created X11 window {:?} ({}x{})", id, width, height);
        Ok((width, height))
    }

    fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        let window = self.windows.remove(&id).ok_or(Error::UnknownWindow(id))?;
        self.by_native.remove(&window.window);
        self.pointer.forget(id);
        if self.keys.focus() == Some(id) {
            self.keys.set_focus(None);
        }

        unsafe { (self.xlib.XDestroyWindow)(self.dpy(), window.window) };
        self.flush();
        debug!("Destroyed X11 window {:?}", id);
        Ok(())
    }

    fn window_size(&self, id: WindowId) -> Option<(u32, u32)> {
        self.windows.get(&id).map(|w| (w.width, w.height))
    }

    fn pump_events(&mut self, events: &mut VecDeque<Event>) -> Result<()> {
        events.extend(self.pending.drain(..));

        let dpy = self.dpy();
        let mut event: xlib::XEvent = unsafe { std::mem::zeroed() };
        while unsafe { (self.xlib.XPending)(dpy) } > 0 {
            unsafe { (self.xlib.XNextEvent)(dpy, &mut event) };
            self.translate(event, events);
        }
        Ok(())
    }

    fn request_frame(&mut self, id: WindowId) -> Result<()> {
        self.window(id)?;
        self.pending.push(Event::FrameUpdate { window: id });
        Ok(())
    }

    fn set_title(&mut self, id: WindowId, title: &str) -> Result<()> {
        let window = self.window(id)?.window;
        let title = CString::new(title).map_err(|e| Error::X11(e.to_string()))?;
        unsafe { (self.xlib.XStoreName)(self.dpy(), window, title.as_ptr()) };
        self.flush();
        Ok(())
    }

    fn set_resizable(&mut self, id: WindowId, resizable: bool) -> Result<()> {
        let window = self.window(id)?;
        self.set_size_hints(window, resizable);
        self.flush();
        Ok(())
    }

    fn set_decorations(&mut self, id: WindowId, decorated: bool) -> Result<()> {
        let window = self.window(id)?.window;
        let hints = motif_hints(decorated);
        unsafe {
            (self.xlib.XChangeProperty)(
                self.dpy(),
                window,
                self.atoms.motif_wm_hints,
                self.atoms.motif_wm_hints,
                32,
                xlib::PropModeReplace,
                hints.as_ptr() as *const c_uchar,
                hints.len() as c_int,
            );
        }
        self.flush();
        Ok(())
    }

    fn set_cursor(&mut self, cursor: CursorKind) -> Result<()> {
        self.cursor = cursor;
        let native = self.font_cursor(cursor);
        for window in self.windows.values() {
            unsafe { (self.xlib.XDefineCursor)(self.dpy(), window.window, native) };
        }
        self.flush();
        Ok(())
    }

    fn set_clipboard(&mut self, mime: &str, text: &str) -> Result<()> {
        let dpy = self.dpy();
        unsafe {
            (self.xlib.XSetSelectionOwner)(
                dpy,
                self.atoms.clipboard,
                self.helper,
                xlib::CurrentTime,
            );
        }
        let owner = unsafe { (self.xlib.XGetSelectionOwner)(dpy, self.atoms.clipboard) };
        if owner != self.helper {
            return Err(Error::Clipboard("could not take CLIPBOARD ownership".into()));
        }
        self.clipboard.set(Payload::new(mime, text));
        self.flush();
        Ok(())
    }

    fn clipboard_text(&mut self) -> Option<String> {
        if let Some(text) = self.clipboard.owned_text() {
            return Some(text);
        }
        match self.read_selection() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read clipboard: {}", e);
                None
            }
        }
    }

    fn start_drag(&mut self, id: WindowId, _mime: &str, _data: &str) -> Result<()> {
        self.window(id)?;
        warn!("Drag and drop is not supported on X11");
        Ok(())
    }

    fn is_disconnected(&self) -> bool {
        CONNECTION_LOST.load(Ordering::SeqCst)
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        let dpy = self.dpy();
        unsafe {
            for (_, window) in self.windows.drain() {
                (self.xlib.XDestroyWindow)(dpy, window.window);
            }
            for (_, cursor) in self.cursors.drain() {
                (self.xlib.XFreeCursor)(dpy, cursor);
            }
            (self.xlib.XDestroyWindow)(dpy, self.helper);
            (self.xlib.XCloseDisplay)(dpy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_marks_connection_lost() {
        unsafe { record_io_error(ptr::null_mut()) };
        assert!(CONNECTION_LOST.load(Ordering::SeqCst));
    }
}
