//! Clipboard module for Wave.
//!
//! Builds as a `cdylib` the host can load at run time, and as an `rlib`
//! so hosts and tests can link it statically.

pub mod backend;
pub mod clipboard;
pub mod module;

pub use clipboard::{Clipboard, ClipboardEventKind, ClipboardResult, ClipboardStatus};
pub use module::ClipboardModule;

wave_module::export_module!(ClipboardModule);
