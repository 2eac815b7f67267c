//! Built-in `help` and `module` commands.

use std::sync::{Arc, Weak};

use serde_json::json;

use wave_core::result::AppResult;
use wave_host::{Command, CommandEngine, CommandResult};
use wave_module::{ModuleError, ModuleRecord, ModuleRegistry};

use crate::output;

/// Registers `help` and `module` on `commands`.
pub fn register_builtins(
    commands: &Arc<CommandEngine>,
    modules: &Arc<ModuleRegistry>,
) -> AppResult<()> {
    commands.register(Arc::new(HelpCommand {
        engine: Arc::downgrade(commands),
    }))?;
    commands.register(Arc::new(ModuleCommand {
        registry: modules.clone(),
    }))?;
    tracing::debug!("Built-in commands registered");
    Ok(())
}

/// Lists registered commands, or shows the usage of one.
///
/// Holds the engine weakly since the engine owns this command.
#[derive(Debug)]
struct HelpCommand {
    engine: Weak<CommandEngine>,
}

impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn help(&self) -> String {
        "help [command] - list commands or show usage of one".to_string()
    }

    fn execute(&self, args: &[String]) -> CommandResult {
        let Some(engine) = self.engine.upgrade() else {
            return CommandResult::error("Command engine is no longer available.");
        };

        if let Some(name) = args.first() {
            return match engine.help_for(name) {
                Some(help) => CommandResult::success(help),
                None => CommandResult::error(format!("Command not found: {name}")),
            };
        }

        let names = engine.registered_commands();
        let lines: Vec<String> = names
            .iter()
            .filter_map(|name| engine.help_for(name))
            .map(|help| format!("  {help}"))
            .collect();
        CommandResult::success(format!("Available commands:\n{}", lines.join("\n")))
            .with_data(json!(names))
    }
}

const MODULE_USAGE: &str = "module <list|load <path>|unload <name>|reload <name>>";

/// Operator surface over the module registry.
#[derive(Debug)]
struct ModuleCommand {
    registry: Arc<ModuleRegistry>,
}

impl ModuleCommand {
    fn list(&self) -> CommandResult {
        let records = self.registry.list();
        let data = serde_json::to_value(&records).unwrap_or_default();
        CommandResult::success(output::module_table(&records)).with_data(data)
    }

    fn outcome(&self, result: Result<ModuleRecord, ModuleError>, verb: &str) -> CommandResult {
        match result {
            Ok(record) => {
                let message =
                    format!("Module {} {verb} (version {}).", record.name, record.version);
                let data = serde_json::to_value(&record).unwrap_or_default();
                CommandResult::success(message).with_data(data)
            }
            Err(e) => {
                let mut result = CommandResult::error(e.message());
                if let Some(record) = e.module() {
                    if let Ok(data) = serde_json::to_value(record) {
                        result = result.with_data(data);
                    }
                }
                result
            }
        }
    }
}

impl Command for ModuleCommand {
    fn name(&self) -> &str {
        "module"
    }

    fn help(&self) -> String {
        MODULE_USAGE.to_string()
    }

    fn execute(&self, args: &[String]) -> CommandResult {
        let Some((sub, rest)) = args.split_first() else {
            return CommandResult::error(format!("Usage: {MODULE_USAGE}"));
        };

        match (sub.as_str(), rest) {
            ("list", []) => self.list(),
            ("load", [path]) => self.outcome(self.registry.load(path), "loaded"),
            ("unload", [name]) => self.outcome(self.registry.unload(name), "unloaded"),
            ("reload", [name]) => self.outcome(self.registry.reload(name), "reloaded"),
            ("list" | "load" | "unload" | "reload", _) => {
                CommandResult::error(format!("Usage: {MODULE_USAGE}"))
            }
            (other, _) => CommandResult::error(format!(
                "Unknown module subcommand: {other}. Usage: {MODULE_USAGE}"
            )),
        }
    }
}
