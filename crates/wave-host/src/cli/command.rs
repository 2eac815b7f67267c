//! Command trait and result types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome category of a command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// The command completed.
    Success,
    /// The command completed with caveats.
    Warning,
    /// The command failed.
    Error,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Outcome category.
    pub status: CommandStatus,
    /// Human-readable message.
    pub message: String,
    /// Optional structured output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandResult {
    /// Successful result.
    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(CommandStatus::Success, message)
    }

    /// Result with a warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_status(CommandStatus::Warning, message)
    }

    /// Failed result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(CommandStatus::Error, message)
    }

    fn with_status(status: CommandStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured output.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns `true` unless the status is [`CommandStatus::Error`].
    pub fn is_ok(&self) -> bool {
        self.status != CommandStatus::Error
    }
}

/// A named command that can be registered with the engine.
pub trait Command: Send + Sync {
    /// Name used as the first token of a command line.
    fn name(&self) -> &str;

    /// One-line usage text.
    fn help(&self) -> String;

    /// Runs the command with the remaining tokens of the line.
    fn execute(&self, args: &[String]) -> CommandResult;
}

type CommandFn = Arc<dyn Fn(&[String]) -> CommandResult + Send + Sync>;

/// Command backed by a closure.
#[derive(Clone)]
pub struct FnCommand {
    name: String,
    help: String,
    handler: CommandFn,
}

impl fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("help", &self.help)
            .field("handler", &"<closure>")
            .finish()
    }
}

impl FnCommand {
    /// Creates a closure-backed command.
    pub fn new<F>(name: impl Into<String>, help: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[String]) -> CommandResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            help: help.into(),
            handler: Arc::new(handler),
        }
    }
}

impl Command for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn help(&self) -> String {
        self.help.clone()
    }

    fn execute(&self, args: &[String]) -> CommandResult {
        (self.handler)(args)
    }
}
