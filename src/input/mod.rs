//! Input handling module
//!
//! Backend-independent pieces of input translation: key tracking and
//! naming, pointer enter/leave tracking, scroll normalization and clipboard
//! state.

pub mod clipboard;
pub mod keyboard;
pub mod pointer;

pub use clipboard::{Clipboard, DndAction, DndActions, Payload};
pub use keyboard::KeyTracker;
pub use pointer::{PointerTracker, ScrollFrame};
