//! `CF_UNICODETEXT` clipboard access

use std::ffi::c_void;

use windows::Win32::Foundation::{HANDLE, HGLOBAL, HWND};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, GetClipboardData, OpenClipboard, SetClipboardData,
};
use windows::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalUnlock, GMEM_MOVEABLE};

use crate::error::{Error, Result};

const CF_UNICODETEXT: u32 = 13;

/// Closes the clipboard when dropped
struct OpenClipboardGuard;

impl OpenClipboardGuard {
    fn open(owner: HWND) -> Result<Self> {
        unsafe { OpenClipboard(Some(owner)) }
            .map_err(|e| Error::Clipboard(format!("failed to open clipboard: {e}")))?;
        Ok(Self)
    }
}

impl Drop for OpenClipboardGuard {
    fn drop(&mut self) {
        let _ = unsafe { CloseClipboard() };
    }
}

/// Replace the clipboard contents with `text`, owned by `owner`
pub fn set_text(owner: HWND, text: &str) -> Result<()> {
    let _guard = OpenClipboardGuard::open(owner)?;

    unsafe { EmptyClipboard() }
        .map_err(|e| Error::Clipboard(format!("failed to empty clipboard: {e}")))?;

    let mut wide: Vec<u16> = text.encode_utf16().collect();
    wide.push(0);
    let size = wide.len() * std::mem::size_of::<u16>();

    unsafe {
        let memory = GlobalAlloc(GMEM_MOVEABLE, size)?;
        let target = GlobalLock(memory);
        if target.is_null() {
            return Err(Error::Clipboard("failed to lock global memory".into()));
        }
        std::ptr::copy_nonoverlapping(wide.as_ptr() as *const c_void, target, size);
        let _ = GlobalUnlock(memory);

        // The clipboard owns the memory once this succeeds
        SetClipboardData(CF_UNICODETEXT, Some(HANDLE(memory.0)))
            .map_err(|e| Error::Clipboard(format!("failed to set clipboard data: {e}")))?;
    }
    Ok(())
}

/// Read the clipboard as text; `None` when it holds no text
pub fn get_text(owner: HWND) -> Result<Option<String>> {
    let _guard = OpenClipboardGuard::open(owner)?;

    let Ok(handle) = (unsafe { GetClipboardData(CF_UNICODETEXT) }) else {
        return Ok(None);
    };

    unsafe {
        let memory = HGLOBAL(handle.0);
        let source = GlobalLock(memory) as *const u16;
        if source.is_null() {
            return Err(Error::Clipboard("failed to lock clipboard data".into()));
        }

        let mut len = 0;
        while *source.add(len) != 0 {
            len += 1;
        }
        let text = String::from_utf16_lossy(std::slice::from_raw_parts(source, len));
        let _ = GlobalUnlock(memory);
        Ok(Some(text))
    }
}
