//! Opens two windows and logs every input callback
//!
//! Escape closes the focused window, `c` copies its title to the clipboard,
//! `v` logs the clipboard text. Set `RUST_LOG=debug` for backend details.

use std::thread;
use std::time::Duration;

use glwm::{Config, CursorKind, WindowManager};
use log::info;

fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    let logger = glwm::logger::init(&config)?;

    let mut wm = WindowManager::with_config(config)?;
    info!("Running on {}", wm.backend_kind());

    let first = wm.create_window("glwm input echo", 640, 480)?;
    let second = wm.create_window("glwm second window", 320, 240)?;
    wm.set_window_resizable(second, false)?;

    wm.on_mouse_enter(|wm, window, x, y| {
        info!("{:?}: pointer enter at ({:.1}, {:.1})", window, x, y);
        let _ = wm.set_cursor(CursorKind::Crosshair);
    });
    wm.on_mouse_leave(|wm, window| {
        info!("{:?}: pointer leave", window);
        let _ = wm.set_cursor(CursorKind::Arrow);
    });
    wm.on_mouse_move(|_, window, x, y| info!("{:?}: motion ({:.1}, {:.1})", window, x, y));
    wm.on_mouse_click(|_, window, button, pressed| {
        info!("{:?}: {:?} pressed={}", window, button, pressed)
    });
    wm.on_scroll(|_, window, scroll| {
        info!(
            "{:?}: scroll {:?} {:.2}px ({:?} notches, {:?})",
            window, scroll.axis, scroll.value, scroll.discrete, scroll.source
        )
    });
    wm.on_touch(|_, window, touch| info!("{:?}: touch {:?}", window, touch));
    wm.on_keyboard_enter(|_, window| info!("{:?}: keyboard focus", window));
    wm.on_keyboard_leave(|_, window| info!("{:?}: keyboard focus lost", window));
    wm.on_keyboard(|wm, window, pressed, value, keycode| {
        info!("{:?}: key '{}' ({}) pressed={}", window, value, keycode, pressed);
        if !pressed {
            return;
        }
        match value {
            "Escape" => {
                let _ = wm.destroy_window(window);
            }
            "c" => {
                let title = wm.window_title(window).unwrap_or_default().to_string();
                let _ = wm.attach_to_clipboard("text/plain;charset=utf-8", &title);
            }
            "v" => info!("Clipboard: {:?}", wm.clipboard_text()),
            _ => {}
        }
    });
    wm.on_drag_n_drop(|_, window, mime, data, x, y| {
        info!("{:?}: dropped {} at ({}, {}): {}", window, mime, x, y, data)
    });
    wm.on_resize(|_, window, width, height| info!("{:?}: resized to {}x{}", window, width, height));
    wm.on_clipboard_changed(|_| info!("Clipboard changed by another client"));
    wm.on_frame_update(|wm, window| {
        if wm.make_context_current(window).is_ok() {
            let _ = wm.swap_buffers(window);
        }
    });

    wm.window_update(first)?;
    wm.window_update(second)?;

    while !wm.should_close() {
        thread::sleep(Duration::from_millis(5));
    }

    logger.save("input_echo.log")?;
    Ok(())
}
