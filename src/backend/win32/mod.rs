//! Win32 backend
//!
//! All windows share one registered class. The window procedure finds the
//! backend state through `GWLP_USERDATA` and queues translated events;
//! [`Backend::pump_events`] drains the thread's message queue and hands them
//! over.

mod clipboard;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::c_void;
use std::num::NonZeroIsize;
use std::rc::Rc;

use log::{debug, info, warn};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, Win32WindowHandle, WindowsDisplayHandle,
};
use windows::core::{w, HSTRING, PCWSTR};
use windows::Win32::Foundation::{GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{InvalidateRect, ValidateRect};
use windows::Win32::System::DataExchange::{
    AddClipboardFormatListener, GetClipboardOwner, RemoveClipboardFormatListener,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyNameTextW, GetKeyboardState, ReleaseCapture, SetCapture, ToUnicode, TrackMouseEvent,
    TME_LEAVE, TRACKMOUSEEVENT,
};
use windows::Win32::UI::Shell::{DragFinish, DragQueryFileW, DragQueryPoint, HDROP};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
    GetMessageExtraInfo, GetWindowLongPtrW, GetWindowRect, LoadCursorW, PeekMessageW,
    RegisterClassW, SetCursor, SetWindowLongPtrW, SetWindowPos, SetWindowTextW, ShowWindow,
    CS_HREDRAW, CS_OWNDC, CS_VREDRAW, CW_USEDEFAULT, GWLP_USERDATA, GWL_STYLE, HCURSOR,
    HTCLIENT, HWND_MESSAGE, IDC_ARROW, IDC_CROSS, IDC_HAND, IDC_IBEAM, IDC_NO, IDC_SIZENS,
    IDC_SIZEWE, MSG, PM_REMOVE, SIZE_MINIMIZED, SWP_FRAMECHANGED, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER,
    SW_SHOW, WINDOW_EX_STYLE, WINDOW_STYLE, WM_CLIPBOARDUPDATE, WM_CLOSE, WM_DROPFILES,
    WM_ERASEBKGND, WM_KEYDOWN, WM_KEYUP, WM_KILLFOCUS, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSELEAVE, WM_MOUSEMOVE, WM_MOUSEWHEEL,
    WM_PAINT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SETCURSOR, WM_SETFOCUS, WM_SIZE, WM_SYSKEYDOWN,
    WM_SYSKEYUP, WM_XBUTTONDOWN, WM_XBUTTONUP, WNDCLASSW, WS_CAPTION, WS_CLIPCHILDREN,
    WS_CLIPSIBLINGS, WS_EX_ACCEPTFILES, WS_EX_APPWINDOW, WS_MAXIMIZEBOX, WS_MINIMIZEBOX,
    WS_POPUP, WS_SYSMENU, WS_THICKFRAME, WS_VISIBLE,
};

use super::{Backend, BackendKind};
use crate::error::{Error, Result};
use crate::event::{CursorKind, Event, MouseButton, ScrollAxis, ScrollInfo, ScrollSource, WindowId};
use crate::input::clipboard::{Clipboard, Payload, URI_LIST_MIME};
use crate::input::keyboard::{evdev_from_scan_code, key_value, named_virtual_key};
use crate::input::pointer::scroll_from_notches;
use crate::input::{KeyTracker, PointerTracker};

const CLASS_NAME: PCWSTR = w!("glwm_window");
const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;
const WHEEL_DELTA: f64 = 120.0;

fn loword(value: usize) -> u16 {
    (value & 0xffff) as u16
}

fn hiword(value: usize) -> u16 {
    ((value >> 16) & 0xffff) as u16
}

/// Signed client coordinates packed in a mouse message's `lParam`
fn point_from_lparam(lparam: LPARAM) -> (f64, f64) {
    let x = loword(lparam.0 as usize) as i16;
    let y = hiword(lparam.0 as usize) as i16;
    (x as f64, y as f64)
}

/// Window style for a combination of the resizable and decorated flags
fn window_style(resizable: bool, decorated: bool) -> WINDOW_STYLE {
    let mut style = WS_CLIPCHILDREN | WS_CLIPSIBLINGS;
    if decorated {
        style |= WS_CAPTION | WS_SYSMENU | WS_MINIMIZEBOX;
        if resizable {
            style |= WS_THICKFRAME | WS_MAXIMIZEBOX;
        }
    } else {
        style |= WS_POPUP;
        if resizable {
            style |= WS_THICKFRAME;
        }
    }
    style
}

/// Normalize a wheel message; `extra_info` is `GetMessageExtraInfo`,
/// non-zero for synthesized touchpad and pen input
fn wheel_scroll(msg: u32, wparam: WPARAM, extra_info: isize) -> ScrollInfo {
    let delta = hiword(wparam.0) as i16 as f64 / WHEEL_DELTA;
    let (axis, notches) = if msg == WM_MOUSEWHEEL {
        // Positive wheel delta rotates away from the user
        (ScrollAxis::Vertical, -delta)
    } else {
        (ScrollAxis::Horizontal, delta)
    };
    let source = if extra_info == 0 {
        ScrollSource::Wheel
    } else {
        ScrollSource::Finger
    };
    scroll_from_notches(axis, notches, source)
}

fn cursor_id(cursor: CursorKind) -> PCWSTR {
    match cursor {
        CursorKind::Arrow => IDC_ARROW,
        CursorKind::IBeam => IDC_IBEAM,
        CursorKind::Crosshair => IDC_CROSS,
        CursorKind::Hand => IDC_HAND,
        CursorKind::HResize => IDC_SIZEWE,
        CursorKind::VResize => IDC_SIZENS,
        CursorKind::NotAllowed => IDC_NO,
    }
}

struct NativeWindow {
    hwnd: HWND,
    width: u32,
    height: u32,
    resizable: bool,
    decorated: bool,
}

/// State reachable from the window procedure
struct Shared {
    helper: HWND,
    windows: HashMap<WindowId, NativeWindow>,
    by_hwnd: HashMap<isize, WindowId>,
    pointer: PointerTracker,
    keys: KeyTracker,
    /// Window with a pending `TME_LEAVE` request
    tracking: Option<WindowId>,
    cursor: HCURSOR,
    clipboard: Clipboard,
    events: Vec<Event>,
}

impl Shared {
    /// Translate one message; `None` defers to `DefWindowProcW`
    fn handle(&mut self, hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Option<LRESULT> {
        if msg == WM_CLIPBOARDUPDATE {
            let owner = unsafe { GetClipboardOwner() }.unwrap_or_default();
            if owner != self.helper && self.clipboard.lost() {
                self.events.push(Event::ClipboardChanged);
            }
            return Some(LRESULT(0));
        }

        let window = *self.by_hwnd.get(&(hwnd.0 as isize))?;

        match msg {
            WM_CLOSE => {
                debug!("Close requested for {:?}", window);
                self.events.push(Event::CloseRequested { window });
                Some(LRESULT(0))
            }
            WM_SIZE => {
                if wparam.0 as u32 != SIZE_MINIMIZED {
                    let width = loword(lparam.0 as usize) as u32;
                    let height = hiword(lparam.0 as usize) as u32;
                    if let Some(native) = self.windows.get_mut(&window) {
                        if (native.width, native.height) != (width, height) {
                            native.width = width;
                            native.height = height;
                            self.events.push(Event::Resized {
                                window,
                                width,
                                height,
                            });
                        }
                    }
                }
                None
            }
            WM_PAINT => {
                let _ = unsafe { ValidateRect(Some(hwnd), None) };
                self.events.push(Event::FrameUpdate { window });
                Some(LRESULT(0))
            }
            WM_ERASEBKGND => Some(LRESULT(1)),
            WM_SETFOCUS => {
                if self.keys.set_focus(Some(window)) != Some(window) {
                    self.events.push(Event::KeyboardEnter { window });
                }
                None
            }
            WM_KILLFOCUS => {
                if self.keys.focus() == Some(window) {
                    self.keys.set_focus(None);
                    self.events.push(Event::KeyboardLeave { window });
                }
                None
            }
            WM_KEYDOWN | WM_KEYUP => {
                self.key(window, wparam, lparam, msg == WM_KEYDOWN);
                Some(LRESULT(0))
            }
            // Alt combinations still reach the default procedure (Alt+F4)
            WM_SYSKEYDOWN | WM_SYSKEYUP => {
                self.key(window, wparam, lparam, msg == WM_SYSKEYDOWN);
                None
            }
            WM_MOUSEMOVE => {
                if self.tracking != Some(window) {
                    let mut request = TRACKMOUSEEVENT {
                        cbSize: std::mem::size_of::<TRACKMOUSEEVENT>() as u32,
                        dwFlags: TME_LEAVE,
                        hwndTrack: hwnd,
                        dwHoverTime: 0,
                    };
                    if unsafe { TrackMouseEvent(&mut request) }.is_ok() {
                        self.tracking = Some(window);
                    }
                }
                let (x, y) = point_from_lparam(lparam);
                self.events.extend(self.pointer.motion(window, x, y));
                Some(LRESULT(0))
            }
            WM_MOUSELEAVE => {
                self.tracking = None;
                self.events.extend(self.pointer.leave(window));
                Some(LRESULT(0))
            }
            WM_LBUTTONDOWN | WM_LBUTTONUP => {
                self.button(hwnd, window, MouseButton::Left, msg == WM_LBUTTONDOWN)
            }
            WM_RBUTTONDOWN | WM_RBUTTONUP => {
                self.button(hwnd, window, MouseButton::Right, msg == WM_RBUTTONDOWN)
            }
            WM_MBUTTONDOWN | WM_MBUTTONUP => {
                self.button(hwnd, window, MouseButton::Middle, msg == WM_MBUTTONDOWN)
            }
            WM_XBUTTONDOWN | WM_XBUTTONUP => {
                let button = MouseButton::Other(hiword(wparam.0) as u32);
                self.button(hwnd, window, button, msg == WM_XBUTTONDOWN)?;
                // XBUTTON messages report handling with TRUE
                Some(LRESULT(1))
            }
            WM_MOUSEWHEEL | WM_MOUSEHWHEEL => {
                let extra_info = unsafe { GetMessageExtraInfo() }.0;
                self.events.push(Event::Scroll {
                    window,
                    scroll: wheel_scroll(msg, wparam, extra_info),
                });
                Some(LRESULT(0))
            }
            WM_SETCURSOR => {
                if loword(lparam.0 as usize) as u32 == HTCLIENT {
                    unsafe { SetCursor(Some(self.cursor)) };
                    Some(LRESULT(1))
                } else {
                    None
                }
            }
            WM_DROPFILES => {
                self.drop_files(window, HDROP(wparam.0 as *mut c_void));
                Some(LRESULT(0))
            }
            _ => None,
        }
    }

    fn key(&mut self, window: WindowId, wparam: WPARAM, lparam: LPARAM, pressed: bool) {
        let virtual_key = wparam.0 as u32;
        let scan_code = ((lparam.0 >> 16) & 0xff) as u32;
        let extended = (lparam.0 >> 24) & 1 == 1;
        let keycode = evdev_from_scan_code(scan_code, extended);

        let fresh = if pressed {
            self.keys.press(keycode)
        } else {
            self.keys.release(keycode)
        };
        if !fresh {
            return;
        }

        let text = key_text(virtual_key, scan_code);
        let name = key_name(lparam);
        self.events.push(Event::Key {
            window,
            pressed,
            value: key_value(&text, named_virtual_key(virtual_key), &name),
            keycode,
        });
    }

    fn button(
        &mut self,
        hwnd: HWND,
        window: WindowId,
        button: MouseButton,
        pressed: bool,
    ) -> Option<LRESULT> {
        if let Some(event) = self.pointer.button(window, button, pressed) {
            self.events.push(event);
        }
        // Keep receiving the release when it happens outside the window
        if pressed {
            unsafe { SetCapture(hwnd) };
        } else if !self.pointer.has_button_pressed() {
            let _ = unsafe { ReleaseCapture() };
        }
        Some(LRESULT(0))
    }

    fn drop_files(&mut self, window: WindowId, drop: HDROP) {
        let mut paths = Vec::new();
        let mut point = POINT::default();
        unsafe {
            let count = DragQueryFileW(drop, u32::MAX, None);
            for index in 0..count {
                let len = DragQueryFileW(drop, index, None) as usize;
                let mut buffer = vec![0u16; len + 1];
                DragQueryFileW(drop, index, Some(&mut buffer));
                paths.push(String::from_utf16_lossy(&buffer[..len]));
            }
            let _ = DragQueryPoint(drop, &mut point);
            DragFinish(drop);
        }

        debug!("{} file(s) dropped on {:?}", paths.len(), window);
        self.events.push(Event::Drop {
            window,
            mime: URI_LIST_MIME.to_string(),
            data: paths.join("\n"),
            x: point.x,
            y: point.y,
        });
    }
}

/// Characters the key produces with the current modifier state
fn key_text(virtual_key: u32, scan_code: u32) -> String {
    let mut state = [0u8; 256];
    if unsafe { GetKeyboardState(&mut state) }.is_err() {
        return String::new();
    }
    let mut buffer = [0u16; 8];
    // Flag bit 2 leaves the dead key state untouched
    let len = unsafe { ToUnicode(virtual_key, scan_code, Some(&state), &mut buffer, 1 << 2) };
    if len > 0 {
        String::from_utf16_lossy(&buffer[..len as usize])
    } else {
        String::new()
    }
}

fn key_name(lparam: LPARAM) -> String {
    let mut buffer = [0u16; 64];
    let len = unsafe { GetKeyNameTextW(lparam.0 as i32, &mut buffer) };
    String::from_utf16_lossy(&buffer[..len.max(0) as usize])
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let shared = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *const RefCell<Shared>;
    if !shared.is_null() {
        // Messages sent while the backend holds the state (e.g. WM_SIZE from
        // SetWindowPos) fall through to the default procedure
        if let Ok(mut shared) = unsafe { &*shared }.try_borrow_mut() {
            if let Some(result) = shared.handle(hwnd, msg, wparam, lparam) {
                return result;
            }
        }
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

/// Connection to the Win32 windowing system of the calling thread
pub struct Win32Backend {
    instance: HINSTANCE,
    shared: Rc<RefCell<Shared>>,
    cursors: HashMap<CursorKind, HCURSOR>,
}

impl Win32Backend {
    /// Register the window class and create the clipboard helper window
    pub fn connect() -> Result<Self> {
        let instance: HINSTANCE = unsafe { GetModuleHandleW(None)? }.into();
        let arrow = unsafe { LoadCursorW(None, IDC_ARROW)? };

        let class = WNDCLASSW {
            style: CS_OWNDC | CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(window_proc),
            hInstance: instance,
            hCursor: arrow,
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };
        if unsafe { RegisterClassW(&class) } == 0 {
            let code = unsafe { GetLastError() };
            if code.0 != ERROR_CLASS_ALREADY_EXISTS {
                return Err(Error::Connect(format!("RegisterClassW failed: {:?}", code)));
            }
        }

        let helper = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                CLASS_NAME,
                w!("glwm clipboard"),
                WINDOW_STYLE::default(),
                0,
                0,
                0,
                0,
                Some(HWND_MESSAGE),
                None,
                Some(instance),
                None,
            )?
        };

        let shared = Rc::new(RefCell::new(Shared {
            helper,
            windows: HashMap::new(),
            by_hwnd: HashMap::new(),
            pointer: PointerTracker::new(),
            keys: KeyTracker::new(),
            tracking: None,
            cursor: arrow,
            clipboard: Clipboard::new(),
            events: Vec::new(),
        }));

        unsafe {
            SetWindowLongPtrW(helper, GWLP_USERDATA, Rc::as_ptr(&shared) as isize);
            if let Err(e) = AddClipboardFormatListener(helper) {
                warn!("Clipboard change notifications unavailable: {}", e);
            }
        }

        let mut cursors = HashMap::new();
        cursors.insert(CursorKind::Arrow, arrow);

        info!("Win32 backend ready");
        Ok(Self {
            instance,
            shared,
            cursors,
        })
    }

    fn hwnd(&self, id: WindowId) -> Result<HWND> {
        self.shared
            .borrow()
            .windows
            .get(&id)
            .map(|w| w.hwnd)
            .ok_or(Error::UnknownWindow(id))
    }

    /// Apply the style for the window's flags, keeping its client size
    fn restyle(&mut self, id: WindowId, update: impl FnOnce(&mut NativeWindow)) -> Result<()> {
        let (hwnd, style) = {
            let mut shared = self.shared.borrow_mut();
            let window = shared.windows.get_mut(&id).ok_or(Error::UnknownWindow(id))?;
            update(window);
            (window.hwnd, window_style(window.resizable, window.decorated))
        };

        unsafe {
            SetWindowLongPtrW(hwnd, GWL_STYLE, (style | WS_VISIBLE).0 as isize);
            SetWindowPos(
                hwnd,
                None,
                0,
                0,
                0,
                0,
                SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER,
            )?;
        }
        Ok(())
    }
}

/// Grow the outer window so the client area is `width` x `height`
fn fit_client_area(hwnd: HWND, width: u32, height: u32) -> Result<()> {
    let mut client = RECT::default();
    let mut outer = RECT::default();
    unsafe {
        GetClientRect(hwnd, &mut client)?;
        GetWindowRect(hwnd, &mut outer)?;
    }
    let border_x = (outer.right - outer.left) - (client.right - client.left);
    let border_y = (outer.bottom - outer.top) - (client.bottom - client.top);
    unsafe {
        SetWindowPos(
            hwnd,
            None,
            0,
            0,
            width as i32 + border_x,
            height as i32 + border_y,
            SWP_NOMOVE | SWP_NOZORDER,
        )?;
    }
    Ok(())
}

impl Backend for Win32Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::Win32
    }

    fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        Ok(RawDisplayHandle::Windows(WindowsDisplayHandle::new()))
    }

    fn raw_window_handle(&self, id: WindowId) -> Result<RawWindowHandle> {
        let hwnd = self.hwnd(id)?;
        let mut handle = Win32WindowHandle::new(
            NonZeroIsize::new(hwnd.0 as isize).ok_or_else(|| Error::Win32("null HWND".into()))?,
        );
        handle.hinstance = NonZeroIsize::new(self.instance.0 as isize);
        Ok(RawWindowHandle::Win32(handle))
    }

    fn create_window(
        &mut self,
        id: WindowId,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32)> {
        let title = HSTRING::from(title);
        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_APPWINDOW | WS_EX_ACCEPTFILES,
                CLASS_NAME,
                &title,
                window_style(true, true),
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                width as i32,
                height as i32,
                None,
                None,
                Some(self.instance),
                None,
            )?
        };
        fit_client_area(hwnd, width, height)?;

        {
            let mut shared = self.shared.borrow_mut();
            shared.windows.insert(
                id,
                NativeWindow {
                    hwnd,
                    width,
                    height,
                    resizable: true,
                    decorated: true,
                },
            );
            shared.by_hwnd.insert(hwnd.0 as isize, id);
        }

        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, Rc::as_ptr(&self.shared) as isize);
            let _ = ShowWindow(hwnd, SW_SHOW);
        }

        info!("Created Win32 window {:?} ({}x{})", id, width, height);
        Ok((width, height))
    }

    fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        let hwnd = {
            let mut shared = self.shared.borrow_mut();
            let window = shared.windows.remove(&id).ok_or(Error::UnknownWindow(id))?;
            shared.by_hwnd.remove(&(window.hwnd.0 as isize));
            shared.pointer.forget(id);
            if shared.tracking == Some(id) {
                shared.tracking = None;
            }
            if shared.keys.focus() == Some(id) {
                shared.keys.set_focus(None);
            }
            window.hwnd
        };

        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            DestroyWindow(hwnd)?;
        }
        debug!("Destroyed Win32 window {:?}", id);
        Ok(())
    }

    fn window_size(&self, id: WindowId) -> Option<(u32, u32)> {
        self.shared
            .borrow()
            .windows
            .get(&id)
            .map(|w| (w.width, w.height))
    }

    fn pump_events(&mut self, events: &mut VecDeque<Event>) -> Result<()> {
        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            unsafe { DispatchMessageW(&msg) };
        }
        events.extend(self.shared.borrow_mut().events.drain(..));
        Ok(())
    }

    fn request_frame(&mut self, id: WindowId) -> Result<()> {
        let hwnd = self.hwnd(id)?;
        let _ = unsafe { InvalidateRect(Some(hwnd), None, false) };
        Ok(())
    }

    fn set_title(&mut self, id: WindowId, title: &str) -> Result<()> {
        let hwnd = self.hwnd(id)?;
        unsafe { SetWindowTextW(hwnd, &HSTRING::from(title))? };
        Ok(())
    }

    fn set_resizable(&mut self, id: WindowId, resizable: bool) -> Result<()> {
        self.restyle(id, |window| window.resizable = resizable)
    }

    fn set_decorations(&mut self, id: WindowId, decorated: bool) -> Result<()> {
        self.restyle(id, |window| window.decorated = decorated)
    }

    fn set_cursor(&mut self, cursor: CursorKind) -> Result<()> {
        let handle = match self.cursors.get(&cursor) {
            Some(handle) => *handle,
            None => {
                let handle = unsafe { LoadCursorW(None, cursor_id(cursor))? };
                self.cursors.insert(cursor, handle);
                handle
            }
        };

        let mut shared = self.shared.borrow_mut();
        shared.cursor = handle;
        if shared.pointer.focus().is_some() {
            unsafe { SetCursor(Some(handle)) };
        }
        Ok(())
    }

    fn set_clipboard(&mut self, mime: &str, text: &str) -> Result<()> {
        let helper = self.shared.borrow().helper;
        clipboard::set_text(helper, text)?;
        self.shared
            .borrow_mut()
            .clipboard
            .set(Payload::new(mime, text));
        Ok(())
    }

    fn clipboard_text(&mut self) -> Option<String> {
        let helper = {
            let shared = self.shared.borrow();
            if let Some(text) = shared.clipboard.owned_text() {
                return Some(text);
            }
            shared.helper
        };
        match clipboard::get_text(helper) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read clipboard: {}", e);
                None
            }
        }
    }

    fn start_drag(&mut self, id: WindowId, _mime: &str, _data: &str) -> Result<()> {
        self.hwnd(id)?;
        warn!("Starting a drag is not supported on Win32");
        Ok(())
    }

    fn is_disconnected(&self) -> bool {
        false
    }
}

impl Drop for Win32Backend {
    fn drop(&mut self) {
        let (helper, windows) = {
            let mut shared = self.shared.borrow_mut();
            shared.by_hwnd.clear();
            let windows: Vec<HWND> = shared.windows.drain().map(|(_, w)| w.hwnd).collect();
            (shared.helper, windows)
        };

        unsafe {
            for hwnd in windows {
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                let _ = DestroyWindow(hwnd);
            }
            SetWindowLongPtrW(helper, GWLP_USERDATA, 0);
            let _ = RemoveClipboardFormatListener(helper);
            let _ = DestroyWindow(helper);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words() {
        assert_eq!(loword(0x0012_0034), 0x34);
        assert_eq!(hiword(0x0012_0034), 0x12);
    }

    #[test]
    fn test_point_from_lparam_is_signed() {
        // (-5, 20) as packed by the system
        let packed = ((20u32 << 16) | (-5i16 as u16 as u32)) as isize;
        assert_eq!(point_from_lparam(LPARAM(packed)), (-5.0, 20.0));
    }

    fn wheel_wparam(delta: i16) -> WPARAM {
        WPARAM(((delta as u16 as usize) << 16) | 0x0008)
    }

    #[test]
    fn test_wheel_away_scrolls_up() {
        let scroll = wheel_scroll(WM_MOUSEWHEEL, wheel_wparam(120), 0);
        assert_eq!(scroll.axis, ScrollAxis::Vertical);
        assert_eq!(scroll.value, -10.0);
        assert_eq!(scroll.discrete, Some(-1));
        assert_eq!(scroll.source, ScrollSource::Wheel);

        let scroll = wheel_scroll(WM_MOUSEWHEEL, wheel_wparam(-240), 0);
        assert_eq!(scroll.value, 20.0);
        assert_eq!(scroll.discrete, Some(2));
    }

    #[test]
    fn test_horizontal_wheel_keeps_sign() {
        let scroll = wheel_scroll(WM_MOUSEHWHEEL, wheel_wparam(120), 0);
        assert_eq!(scroll.axis, ScrollAxis::Horizontal);
        assert_eq!(scroll.value, 10.0);
        assert_eq!(scroll.discrete, Some(1));
    }

    #[test]
    fn test_partial_wheel_delta() {
        let scroll = wheel_scroll(WM_MOUSEWHEEL, wheel_wparam(30), 0);
        assert_eq!(scroll.value, -2.5);
        assert_eq!(scroll.discrete, None);
    }

    #[test]
    fn test_wheel_source_from_extra_info() {
        let scroll = wheel_scroll(WM_MOUSEWHEEL, wheel_wparam(120), 0xFF51_5700u32 as isize);
        assert_eq!(scroll.source, ScrollSource::Finger);
    }

    #[test]
    fn test_window_style() {
        let style = window_style(true, true);
        assert!(style.contains(WS_THICKFRAME));
        assert!(style.contains(WS_CAPTION));

        let style = window_style(false, true);
        assert!(!style.contains(WS_THICKFRAME));
        assert!(!style.contains(WS_MAXIMIZEBOX));

        let style = window_style(true, false);
        assert!(style.contains(WS_POPUP));
        assert!(!style.contains(WS_CAPTION));
    }
}
