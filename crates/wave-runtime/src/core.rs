//! Top-level composition object.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use wave_core::config::module::ModuleConfig;
use wave_core::result::AppResult;
use wave_host::{
    CommandEngine, CommandResult, ConfigurationSystem, EventBus, LogEntry, LogLevel, LoggingSystem,
};
use wave_module::{CoreAccess, ModuleBinder, ModuleEventKind, ModuleRegistry};

use crate::commands;

const LOG_CATEGORY: &str = "Core";
const LOADER_CATEGORY: &str = "ModuleLoader";

/// Owns one instance of every host subsystem and hands itself to modules
/// as their [`CoreAccess`].
pub struct Core {
    logging: Arc<LoggingSystem>,
    configuration: Arc<ConfigurationSystem>,
    event_bus: Arc<EventBus>,
    commands: Arc<CommandEngine>,
    modules: Arc<ModuleRegistry>,
    running: AtomicBool,
    wired: AtomicBool,
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("modules", &self.modules)
            .field("commands", &self.commands)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Core {
    /// Creates a core whose registry opens binaries through `binder`.
    pub fn new(binder: Arc<dyn ModuleBinder>, config: &ModuleConfig) -> Arc<Self> {
        let require_destructor = config.require_destructor;
        Arc::new_cyclic(|weak: &Weak<Core>| {
            let access: Weak<dyn CoreAccess> = weak.clone();
            Self {
                logging: Arc::new(LoggingSystem::new()),
                configuration: Arc::new(ConfigurationSystem::new()),
                event_bus: Arc::new(EventBus::new()),
                commands: Arc::new(CommandEngine::new()),
                modules: Arc::new(
                    ModuleRegistry::new(binder, access)
                        .with_require_destructor(require_destructor),
                ),
                running: AtomicBool::new(false),
                wired: AtomicBool::new(false),
            }
        })
    }

    /// Creates a core loading modules from shared libraries.
    pub fn native(config: &ModuleConfig) -> Arc<Self> {
        Self::new(Arc::new(wave_module::binding::NativeBinder::new()), config)
    }

    /// Loads the settings store (if a path is given), registers built-in
    /// commands and starts forwarding module events to the logger.
    ///
    /// A settings file that fails to load is logged and skipped.
    pub fn initialize(&self, settings: Option<&Path>) -> AppResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            self.logging
                .warning(LOG_CATEGORY, "Core::initialize() called multiple times.");
            return Ok(());
        }

        if let Some(path) = settings {
            match self.configuration.load_from(path) {
                Ok(()) => self.logging.info(
                    LOG_CATEGORY,
                    format!("Settings loaded from '{}'", path.display()),
                ),
                Err(e) => self.logging.error(
                    LOG_CATEGORY,
                    format!("Failed to load settings from '{}': {e}", path.display()),
                ),
            }
        }

        // Built-ins and the event bridge survive shutdown; wire them once.
        if !self.wired.swap(true, Ordering::SeqCst) {
            commands::register_builtins(&self.commands, &self.modules)?;
            self.bridge_module_events();
        }

        self.logging
            .info(LOG_CATEGORY, "Core initialized successfully.");
        Ok(())
    }

    fn bridge_module_events(&self) {
        let logging = self.logging.clone();
        self.modules.subscribe(move |kind, record, message| {
            let level = if kind.is_error() {
                LogLevel::Error
            } else {
                LogLevel::Info
            };
            let data = serde_json::to_value(record).ok();
            let mut entry =
                LogEntry::new(level, LOADER_CATEGORY, format!("[{kind}] {message}"));
            if let Some(data) = data {
                entry = entry.with_data(data);
            }
            logging.log(entry);
            if kind == ModuleEventKind::Loaded {
                tracing::debug!(module = %record.name, "Module available");
            }
        });
    }

    /// Unloads every module, then marks the core stopped.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            self.logging.warning(
                LOG_CATEGORY,
                "Core::shutdown() called without prior initialization or multiple times.",
            );
            return;
        }

        self.logging.info(LOG_CATEGORY, "Core shutting down...");
        let unloaded = self.modules.unload_all();
        if !unloaded.is_empty() {
            self.logging.info(
                LOG_CATEGORY,
                format!("Unloaded modules: {}", unloaded.join(", ")),
            );
        }
        self.logging.info(LOG_CATEGORY, "Core shutdown complete.");
    }

    /// Returns `true` between `initialize` and `shutdown`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Executes a command line.
    pub fn execute(&self, line: &str) -> CommandResult {
        self.commands.execute(line)
    }

    /// The module registry.
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }
}

impl CoreAccess for Core {
    fn logging(&self) -> Arc<LoggingSystem> {
        self.logging.clone()
    }

    fn configuration(&self) -> Arc<ConfigurationSystem> {
        self.configuration.clone()
    }

    fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    fn commands(&self) -> Arc<CommandEngine> {
        self.commands.clone()
    }

    fn modules(&self) -> Option<Arc<ModuleRegistry>> {
        Some(self.modules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wave_module::mock::MockBinder;

    fn core() -> Arc<Core> {
        Core::new(Arc::new(MockBinder::new()), &ModuleConfig::default())
    }

    #[test]
    fn test_initialize_registers_builtins() {
        let core = core();
        core.initialize(None).unwrap();

        assert!(core.is_running());
        let names = core.commands().registered_commands();
        assert!(names.contains(&"help".to_string()));
        assert!(names.contains(&"module".to_string()));
    }

    #[test]
    fn test_initialize_twice_is_harmless() {
        let core = core();
        core.initialize(None).unwrap();
        core.initialize(None).unwrap();
        assert_eq!(core.commands().registered_commands().len(), 2);
    }

    #[test]
    fn test_initialize_loads_settings() {
        let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        writeln!(file, "[clipboard]\nbackend = memory").unwrap();

        let core = core();
        core.initialize(Some(file.path())).unwrap();
        assert_eq!(
            core.configuration().get_value("clipboard", "backend").unwrap(),
            "memory"
        );
    }

    #[test]
    fn test_missing_settings_file_is_not_fatal() {
        let core = core();
        core.initialize(Some(Path::new("/nonexistent/wave.ini"))).unwrap();
        assert!(core.is_running());
    }

    #[test]
    fn test_reinitialize_after_shutdown() {
        let core = core();
        core.initialize(None).unwrap();
        core.shutdown();
        core.initialize(None).unwrap();
        assert!(core.is_running());
        assert_eq!(core.commands().registered_commands().len(), 2);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let core = core();
        core.shutdown();
        assert!(!core.is_running());

        core.initialize(None).unwrap();
        core.shutdown();
        core.shutdown();
        assert!(!core.is_running());
    }
}
