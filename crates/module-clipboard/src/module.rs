//! `ClipboardModule`: wires the clipboard into the host.

use std::sync::Arc;

use serde_json::json;

use wave_host::{CommandEngine, CommandResult, FnCommand, LoggingSystem};
use wave_module::{CoreAccess, LauncherModule};

use crate::backend::BackendKind;
use crate::clipboard::{Clipboard, ClipboardResult, ClipboardStatus};

/// Name reported to the host.
pub const MODULE_NAME: &str = "ClipboardModule";

/// Version reported to the host.
pub const MODULE_VERSION: &str = "1.0.0";

/// Command registered while the module is loaded.
pub const COMMAND_NAME: &str = "clipboard";

/// Settings section read during `initialize`.
pub const SETTINGS_SECTION: &str = "clipboard";

/// History entries kept unless `history_limit` says otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

const USAGE: &str = "clipboard <copy <text...>|paste|history|clear>";

/// Clipboard module.
///
/// Settings (`[clipboard]`): `backend = memory|system`, `history_limit`.
#[derive(Default)]
pub struct ClipboardModule {
    clipboard: Option<Arc<Clipboard>>,
    commands: Option<Arc<CommandEngine>>,
    logging: Option<Arc<LoggingSystem>>,
}

impl ClipboardModule {
    /// Creates an uninitialized module.
    pub fn new() -> Self {
        Self::default()
    }

    /// The clipboard, once initialized.
    pub fn clipboard(&self) -> Option<&Arc<Clipboard>> {
        self.clipboard.as_ref()
    }
}

impl LauncherModule for ClipboardModule {
    fn initialize(&mut self, core: Arc<dyn CoreAccess>) -> Result<(), String> {
        let settings = core.configuration();
        let logging = core.logging();

        let kind = match settings.get_value(SETTINGS_SECTION, "backend") {
            Ok(value) => value.parse::<BackendKind>().unwrap_or_else(|e| {
                logging.warning(MODULE_NAME, format!("{e}; falling back to memory."));
                BackendKind::Memory
            }),
            Err(_) => BackendKind::default(),
        };
        let history_limit =
            settings.get_or(SETTINGS_SECTION, "history_limit", DEFAULT_HISTORY_LIMIT);

        let clipboard =
            Arc::new(Clipboard::new(kind.build(), history_limit).with_event_bus(core.event_bus()));

        let commands = core.commands();
        let target = clipboard.clone();
        commands
            .register(Arc::new(FnCommand::new(COMMAND_NAME, USAGE, move |args| {
                run_command(&target, args)
            })))
            .map_err(|e| format!("Failed to register '{COMMAND_NAME}' command: {e}"))?;

        logging.info(
            MODULE_NAME,
            format!(
                "ClipboardModule initialized (backend: {}, history: {history_limit}).",
                clipboard.backend_name()
            ),
        );

        self.clipboard = Some(clipboard);
        self.commands = Some(commands);
        self.logging = Some(logging);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), String> {
        if let Some(commands) = self.commands.take() {
            commands.unregister(COMMAND_NAME);
        }
        self.clipboard = None;
        if let Some(logging) = self.logging.take() {
            logging.info(MODULE_NAME, "ClipboardModule shut down.");
        }
        Ok(())
    }

    fn name(&self) -> String {
        MODULE_NAME.to_string()
    }

    fn version(&self) -> String {
        MODULE_VERSION.to_string()
    }
}

fn run_command(clipboard: &Clipboard, args: &[String]) -> CommandResult {
    match args.split_first() {
        Some((sub, text)) if sub == "copy" && !text.is_empty() => {
            to_command_result(clipboard.copy(&text.join(" ")))
        }
        Some((sub, [])) if sub == "paste" => to_command_result(clipboard.paste()),
        Some((sub, [])) if sub == "history" => {
            let history = clipboard.history();
            let message = if history.is_empty() {
                "Clipboard history is empty.".to_string()
            } else {
                history
                    .iter()
                    .enumerate()
                    .map(|(i, text)| format!("{:>3}: {text}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            CommandResult::success(message).with_data(json!(history))
        }
        Some((sub, [])) if sub == "clear" => to_command_result(clipboard.clear_history()),
        _ => CommandResult::error(format!("Usage: {USAGE}")),
    }
}

fn to_command_result(result: ClipboardResult) -> CommandResult {
    let command = match result.status {
        ClipboardStatus::Success => CommandResult::success(result.message),
        ClipboardStatus::Error => CommandResult::error(result.message),
        ClipboardStatus::NotSupported => CommandResult::warning(result.message),
    };
    match result.data {
        Some(text) => command.with_data(json!(text)),
        None => command,
    }
}
