//! Line-oriented command engine.

pub mod command;
pub mod engine;

pub use command::{Command, CommandResult, CommandStatus, FnCommand};
pub use engine::CommandEngine;
