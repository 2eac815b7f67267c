//! # wave-host
//!
//! Host subsystems that modules reach through the capability-access
//! object:
//!
//! - Leveled, per-category logging bridged onto `tracing`
//! - INI-backed configuration store with change notifications
//! - Publish/subscribe event bus with sync and async delivery
//! - Line-oriented command engine

pub mod cli;
pub mod configuration;
pub mod eventbus;
pub mod logging;

pub use cli::{Command, CommandEngine, CommandResult, CommandStatus, FnCommand};
pub use configuration::{ConfigEvent, ConfigLookupError, ConfigurationSystem};
pub use eventbus::{DeliveryMode, EventBus, SubscriptionId};
pub use logging::{LogEntry, LogLevel, LoggingSystem};

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs a subscriber callback, containing any panic it raises.
///
/// Returns `false` when the callback panicked.
pub(crate) fn guarded<F: FnOnce()>(f: F) -> bool {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).is_ok()
}
