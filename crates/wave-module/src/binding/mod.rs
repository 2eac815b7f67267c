//! Binding adapter: uniform open / resolve / close over native binaries.
//!
//! Implementations hold no registry state; every call stands alone and
//! failures come back as descriptive strings.

use std::fmt::Debug;
use std::path::Path;

use crate::abi::{CreateModuleFn, DestroyModuleFn};

#[cfg(feature = "dynamic")]
pub mod native;

#[cfg(feature = "dynamic")]
pub use native::NativeBinder;

/// Opens module binaries.
pub trait ModuleBinder: Send + Sync + Debug {
    /// Opens the binary at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn LibraryHandle>, String>;
}

/// An open module binary.
///
/// Resolved function pointers are only valid while the handle is open.
pub trait LibraryHandle: Send + Debug {
    /// Resolves `create_module_instance`.
    fn resolve_factory(&self) -> Result<CreateModuleFn, String>;

    /// Resolves `destroy_module_instance`.
    fn resolve_destructor(&self) -> Result<DestroyModuleFn, String>;

    /// Closes the binary. The handle is consumed even on failure.
    fn close(self: Box<Self>) -> Result<(), String>;
}
