//! ABI shared between the host and loadable modules.
//!
//! A module binary exports two unmangled functions:
//!
//! ```text
//! extern "C" fn create_module_instance() -> *mut Box<dyn LauncherModule>
//! extern "C" fn destroy_module_instance(instance: *mut Box<dyn LauncherModule>)
//! ```
//!
//! The pointer is a thin pointer to a boxed trait object, so it crosses the
//! C ABI unchanged. Host and module must be built with the same toolchain
//! and the same `wave-module` version.

use std::sync::Arc;

use crate::api::context::CoreAccess;

/// Name of the mandatory factory symbol.
pub const CREATE_MODULE_FN_NAME: &str = "create_module_instance";

/// Name of the destructor symbol.
pub const DESTROY_MODULE_FN_NAME: &str = "destroy_module_instance";

/// Factory symbol as passed to the platform loader.
pub const CREATE_MODULE_SYMBOL: &[u8] = b"create_module_instance\0";

/// Destructor symbol as passed to the platform loader.
pub const DESTROY_MODULE_SYMBOL: &[u8] = b"destroy_module_instance\0";

/// Interface every loadable module implements.
///
/// `initialize` is called exactly once before anything else and is paired
/// with exactly one `shutdown` before the instance is destroyed.
pub trait LauncherModule: Send {
    /// Brings the module up. `core` may be kept for as long as the module
    /// stays loaded.
    fn initialize(&mut self, core: Arc<dyn CoreAccess>) -> Result<(), String>;

    /// Releases everything acquired in `initialize`.
    fn shutdown(&mut self) -> Result<(), String>;

    /// Unique module name.
    fn name(&self) -> String;

    /// Module version string.
    fn version(&self) -> String;
}

/// Heap object handed across the ABI.
pub type ModuleInstance = Box<dyn LauncherModule>;

/// Signature of `create_module_instance`. Returns null on refusal.
#[allow(improper_ctypes_definitions)]
pub type CreateModuleFn = unsafe extern "C" fn() -> *mut ModuleInstance;

/// Signature of `destroy_module_instance`. Returns `false` when the
/// instance's teardown faulted.
#[allow(improper_ctypes_definitions)]
pub type DestroyModuleFn = unsafe extern "C" fn(*mut ModuleInstance) -> bool;
