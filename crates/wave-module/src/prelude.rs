//! Prelude for module authors.

pub use std::sync::Arc;

pub use wave_host::{
    Command, CommandEngine, CommandResult, CommandStatus, ConfigurationSystem, DeliveryMode,
    EventBus, FnCommand, LogLevel, LoggingSystem,
};

pub use crate::abi::LauncherModule;
pub use crate::api::context::CoreAccess;
pub use crate::record::{ModuleEventKind, ModuleRecord};

pub use crate::export_module;
