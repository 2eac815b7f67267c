//! # wave-module
//!
//! Runtime for natively loaded Wave modules. Provides:
//!
//! - The module ABI (`LauncherModule`, factory/destructor symbols)
//! - A binding adapter over the platform loader (`libloading`)
//! - The module registry driving load, unload and reload
//! - Lifecycle event notification
//! - The `CoreAccess` capability handed to modules

pub mod abi;
pub mod api;
pub mod binding;
pub mod handle;
pub mod macros;
#[cfg(feature = "mock")]
pub mod mock;
pub mod notifier;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod safety;

pub use abi::{LauncherModule, ModuleInstance};
pub use api::context::CoreAccess;
pub use binding::{LibraryHandle, ModuleBinder};
pub use handle::ModuleHandle;
pub use notifier::{EventNotifier, SubscriptionId};
pub use record::{ModuleError, ModuleEventKind, ModuleRecord, ModuleState};
pub use registry::ModuleRegistry;
