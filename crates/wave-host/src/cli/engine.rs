//! Command registry and dispatcher.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use wave_core::error::AppError;
use wave_core::result::AppResult;

use super::command::{Command, CommandResult};
use crate::panic_message;

/// Registry of named commands, dispatched from whitespace-separated lines.
pub struct CommandEngine {
    commands: RwLock<BTreeMap<String, Arc<dyn Command>>>,
}

impl fmt::Debug for CommandEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEngine")
            .field("commands", &self.registered_commands())
            .finish()
    }
}

impl CommandEngine {
    /// Creates an engine with no commands.
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a command under its own name. The first registration of a
    /// name wins.
    pub fn register(&self, command: Arc<dyn Command>) -> AppResult<()> {
        let name = command.name().trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("Command name cannot be empty"));
        }

        let mut commands = self.commands.write();
        if commands.contains_key(&name) {
            return Err(AppError::conflict(format!(
                "Command '{name}' is already registered"
            )));
        }
        commands.insert(name.clone(), command);
        tracing::debug!(command = %name, "Command registered");
        Ok(())
    }

    /// Removes a command. Returns `false` if it was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.commands.write().remove(name).is_some();
        if removed {
            tracing::debug!(command = %name, "Command unregistered");
        }
        removed
    }

    /// Sorted names of all registered commands.
    pub fn registered_commands(&self) -> Vec<String> {
        self.commands.read().keys().cloned().collect()
    }

    /// Usage text of a command.
    pub fn help_for(&self, name: &str) -> Option<String> {
        self.commands.read().get(name).map(|c| c.help())
    }

    /// Returns `true` if a command with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.read().contains_key(name)
    }

    /// Parses and executes a command line.
    pub fn execute(&self, line: &str) -> CommandResult {
        let mut tokens = line.split_whitespace().map(str::to_string);
        let Some(name) = tokens.next() else {
            return CommandResult::error("Command line cannot be empty.");
        };
        let args: Vec<String> = tokens.collect();

        // Clone out so a command may register or unregister others.
        let command = self.commands.read().get(&name).cloned();
        let Some(command) = command else {
            return CommandResult::error(format!("Command not found: {name}"));
        };

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| command.execute(&args))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(command = %name, %reason, "Command panicked");
                CommandResult::error(format!("Command execution failed with exception: {reason}"))
            }
        }
    }
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::command::{CommandStatus, FnCommand};

    fn echo() -> Arc<dyn Command> {
        Arc::new(FnCommand::new("echo", "echo <text...>", |args| {
            CommandResult::success(args.join(" "))
        }))
    }

    #[test]
    fn test_execute_registered_command() {
        let engine = CommandEngine::new();
        engine.register(echo()).unwrap();

        let result = engine.execute("  echo hello   world ");
        assert_eq!(result.status, CommandStatus::Success);
        assert_eq!(result.message, "hello world");
    }

    #[test]
    fn test_empty_and_unknown_lines() {
        let engine = CommandEngine::new();

        let empty = engine.execute("   ");
        assert_eq!(empty.status, CommandStatus::Error);
        assert_eq!(empty.message, "Command line cannot be empty.");

        let unknown = engine.execute("launch rockets");
        assert_eq!(unknown.status, CommandStatus::Error);
        assert_eq!(unknown.message, "Command not found: launch");
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty_names() {
        let engine = CommandEngine::new();
        engine.register(echo()).unwrap();

        let dup = engine.register(Arc::new(FnCommand::new("echo", "", |_| {
            CommandResult::error("second")
        })));
        assert_eq!(dup.unwrap_err().kind, wave_core::ErrorKind::Conflict);
        assert_eq!(engine.execute("echo a").message, "a");

        let empty = engine.register(Arc::new(FnCommand::new(" ", "", |_| {
            CommandResult::success("")
        })));
        assert!(empty.is_err());
    }

    #[test]
    fn test_unregister() {
        let engine = CommandEngine::new();
        engine.register(echo()).unwrap();
        assert_eq!(engine.registered_commands(), vec!["echo".to_string()]);
        assert_eq!(engine.help_for("echo").as_deref(), Some("echo <text...>"));

        assert!(engine.unregister("echo"));
        assert!(!engine.unregister("echo"));
        assert!(!engine.contains("echo"));
    }

    #[test]
    fn test_panicking_command_becomes_error() {
        let engine = CommandEngine::new();
        engine
            .register(Arc::new(FnCommand::new("boom", "", |_| panic!("boom"))))
            .unwrap();

        let result = engine.execute("boom");
        assert_eq!(result.status, CommandStatus::Error);
        assert_eq!(result.message, "Command execution failed with exception: boom");
        assert!(!result.is_ok());
    }
}
