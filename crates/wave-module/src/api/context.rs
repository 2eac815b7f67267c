//! Capability-access object handed to modules.

use std::sync::Arc;

use wave_host::{CommandEngine, ConfigurationSystem, EventBus, LoggingSystem};

use crate::registry::ModuleRegistry;

/// Gives modules access to the host's subsystems without linking against
/// the host binary.
///
/// The registry holds this as a `Weak` reference; modules receive an `Arc`
/// in `initialize` and may keep it while loaded.
pub trait CoreAccess: Send + Sync {
    /// Host logging system.
    fn logging(&self) -> Arc<LoggingSystem>;

    /// Host configuration store.
    fn configuration(&self) -> Arc<ConfigurationSystem>;

    /// Host event bus.
    fn event_bus(&self) -> Arc<EventBus>;

    /// Host command engine.
    fn commands(&self) -> Arc<CommandEngine>;

    /// The module registry, if one is attached.
    ///
    /// Calling registry operations from inside a module lifecycle callback
    /// deadlocks: the registry lock is held for the whole callback.
    fn modules(&self) -> Option<Arc<ModuleRegistry>>;
}
