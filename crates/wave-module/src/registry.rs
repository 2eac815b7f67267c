//! Module registry: the authoritative table of loaded modules and the
//! load / unload / reload state machine.
//!
//! One mutex serializes every table access. Lifecycle callbacks and event
//! subscribers run while it is held, so they must not call back into the
//! registry.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use wave_core::error::AppError;
use wave_core::result::AppResult;

use crate::abi::{CREATE_MODULE_FN_NAME, DESTROY_MODULE_FN_NAME, LauncherModule};
use crate::api::context::CoreAccess;
use crate::binding::{LibraryHandle, ModuleBinder};
use crate::handle::ModuleHandle;
use crate::notifier::{EventNotifier, SubscriptionId};
use crate::record::{ModuleError, ModuleEventKind, ModuleRecord, ModuleState};
use crate::safety::{guarded_call, guarded_value};

/// Result of a registry operation.
pub type ModuleResult = Result<ModuleRecord, ModuleError>;

/// A table entry. `handle` is `None` once the record is quarantined.
struct LoadedModule {
    record: ModuleRecord,
    handle: Option<ModuleHandle>,
}

type Table = BTreeMap<String, LoadedModule>;

/// Who asked for a lifecycle step; decides which events are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// A direct `load` / `unload` call.
    Operator,
    /// One half of a `reload`; the reload reports the outcome.
    Reload,
    /// Mass unload at shutdown; silent.
    Teardown,
}

/// Registry of loaded modules.
pub struct ModuleRegistry {
    modules: Mutex<Table>,
    binder: Arc<dyn ModuleBinder>,
    core: Weak<dyn CoreAccess>,
    notifier: EventNotifier,
    require_destructor: bool,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.lock().keys().collect::<Vec<_>>())
            .field("binder", &self.binder)
            .field("notifier", &self.notifier)
            .field("require_destructor", &self.require_destructor)
            .finish()
    }
}

impl ModuleRegistry {
    /// Creates an empty registry.
    ///
    /// `core` is handed to every module's `initialize`; the registry does
    /// not keep the host alive.
    pub fn new(binder: Arc<dyn ModuleBinder>, core: Weak<dyn CoreAccess>) -> Self {
        Self {
            modules: Mutex::new(BTreeMap::new()),
            binder,
            core,
            notifier: EventNotifier::new(),
            require_destructor: true,
        }
    }

    /// Whether binaries without `destroy_module_instance` are rejected.
    /// Defaults to `true`; when `false` such instances are leaked on unload.
    pub fn with_require_destructor(mut self, require: bool) -> Self {
        self.require_destructor = require;
        self
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(
        &self,
        callback: impl Fn(ModuleEventKind, &ModuleRecord, &str) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    /// Loads the module binary at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> ModuleResult {
        let path = path.as_ref();
        let mut table = self.modules.lock();
        let record = self.load_locked(&mut table, path, Trigger::Operator)?;
        self.notifier
            .notify(ModuleEventKind::Loaded, &record, "Module loaded successfully.");
        Ok(record)
    }

    /// Unloads the module named `name`.
    pub fn unload(&self, name: &str) -> ModuleResult {
        let mut table = self.modules.lock();
        let record = self.unload_locked(&mut table, name, Trigger::Operator)?;
        self.notifier.notify(
            ModuleEventKind::Unloaded,
            &record,
            "Module unloaded successfully.",
        );
        Ok(record)
    }

    /// Unloads and loads a module again from its recorded path, without
    /// releasing the registry lock in between.
    pub fn reload(&self, name: &str) -> ModuleResult {
        let mut table = self.modules.lock();

        let Some(path) = table.get(name).map(|m| m.record.path.clone()) else {
            return Err(ModuleError::not_found(format!(
                "Module not found for reload: {name}"
            )));
        };

        if let Err(e) = self.unload_locked(&mut table, name, Trigger::Reload) {
            let record = e
                .module()
                .cloned()
                .unwrap_or_else(|| ModuleRecord::from_path(&path).with_name(name));
            self.notifier.notify(
                ModuleEventKind::ErrorUnloading,
                &record,
                &format!("Failed to unload module during reload: {}", e.message()),
            );
            return Err(ModuleError::failed(
                format!("Reload failed during unload phase: {}", e.message()),
                Some(record),
            ));
        }

        match self.load_locked(&mut table, &path, Trigger::Reload) {
            Ok(record) => {
                self.notifier.notify(
                    ModuleEventKind::Reloaded,
                    &record,
                    "Module reloaded successfully.",
                );
                Ok(record)
            }
            Err(e) => {
                let record = ModuleRecord::from_path(&path).with_name(name);
                self.notifier.notify(
                    ModuleEventKind::ErrorLoading,
                    &record,
                    &format!("Failed to load module during reload: {}", e.message()),
                );
                Err(ModuleError::failed(
                    format!("Reload failed during load phase: {}", e.message()),
                    Some(record),
                ))
            }
        }
    }

    /// Snapshot of all records, ordered by name.
    pub fn list(&self) -> Vec<ModuleRecord> {
        self.modules
            .lock()
            .values()
            .map(|m| m.record.clone())
            .collect()
    }

    /// Record of the module named `name`.
    pub fn get(&self, name: &str) -> Option<ModuleRecord> {
        self.modules.lock().get(name).map(|m| m.record.clone())
    }

    /// Returns `true` if a module named `name` is in the table.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.lock().contains_key(name)
    }

    /// Number of records in the table.
    pub fn count(&self) -> usize {
        self.modules.lock().len()
    }

    /// Loads every shared library in `dir`, in file-name order.
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> AppResult<Vec<(PathBuf, ModuleResult)>> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            AppError::with_source(
                wave_core::ErrorKind::Io,
                format!("Failed to read module directory '{}'", dir.display()),
                e,
            )
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str())
                        == Some(std::env::consts::DLL_EXTENSION)
            })
            .collect();
        paths.sort();

        tracing::info!(
            directory = %dir.display(),
            candidates = paths.len(),
            "Loading modules from directory"
        );

        Ok(paths
            .into_iter()
            .map(|path| {
                let result = self.load(&path);
                (path, result)
            })
            .collect())
    }

    /// Unloads every module without emitting lifecycle events.
    ///
    /// Returns the names that were removed from the table.
    pub fn unload_all(&self) -> Vec<String> {
        let mut table = self.modules.lock();
        self.teardown(&mut table)
    }

    fn teardown(&self, table: &mut Table) -> Vec<String> {
        let names: Vec<String> = table.keys().cloned().collect();
        let mut removed = Vec::with_capacity(names.len());
        for name in names {
            match self.unload_locked(table, &name, Trigger::Teardown) {
                Ok(_) => removed.push(name),
                Err(e) => tracing::warn!(module = %name, error = %e, "Module left behind at teardown"),
            }
        }
        removed
    }

    fn load_locked(&self, table: &mut Table, path: &Path, trigger: Trigger) -> ModuleResult {
        if let Some(existing) = table.values().find(|m| m.record.path == path) {
            return Err(ModuleError::failed(
                format!(
                    "Module from this path is already loaded: {}",
                    path.display()
                ),
                Some(existing.record.clone()),
            ));
        }

        let partial = ModuleRecord::from_path(path);

        let library = match self.binder.open(path) {
            Ok(library) => library,
            Err(e) => {
                return Err(self.load_failed(
                    trigger,
                    partial,
                    format!("Failed to load library: {} (Error: {e})", path.display()),
                ));
            }
        };

        let factory = match library.resolve_factory() {
            Ok(factory) => factory,
            Err(e) => {
                close_library(library, path);
                return Err(self.load_failed(
                    trigger,
                    partial,
                    format!(
                        "Failed to find '{CREATE_MODULE_FN_NAME}' in {} ({e})",
                        path.display()
                    ),
                ));
            }
        };

        if self.require_destructor {
            if let Err(e) = library.resolve_destructor() {
                close_library(library, path);
                return Err(self.load_failed(
                    trigger,
                    partial,
                    format!(
                        "Failed to find '{DESTROY_MODULE_FN_NAME}' in {} ({e})",
                        path.display()
                    ),
                ));
            }
        }

        // SAFETY: the factory was resolved from `library`, which is open.
        // Exported factories contain their own panics and return null.
        let raw = unsafe { factory() };
        let Some(instance) = NonNull::new(raw) else {
            close_library(library, path);
            return Err(self.load_failed(
                trigger,
                partial,
                format!(
                    "{CREATE_MODULE_FN_NAME} returned null from {}",
                    path.display()
                ),
            ));
        };

        let mut handle = ModuleHandle::new(library, instance);

        let initialized = match self.core.upgrade() {
            Some(core) => match handle.module_mut() {
                Some(module) => guarded_call(|| module.initialize(core)),
                None => Err("instance unavailable".to_string()),
            },
            None => Err("host core is no longer available".to_string()),
        };
        if let Err(e) = initialized {
            let name = handle.module().map(module_name).unwrap_or_default();
            release_handle(handle, path);
            return Err(self.load_failed(
                trigger,
                partial.with_name(name.clone()),
                format!("Module {name} initialize() failed: {e}"),
            ));
        }

        let identity = handle
            .module()
            .and_then(|module| guarded_value(|| (module.name(), module.version())));
        let Some((name, version)) = identity else {
            shutdown_quietly(&mut handle);
            release_handle(handle, path);
            return Err(self.load_failed(
                trigger,
                partial,
                format!("Module at {} failed to report its identity", path.display()),
            ));
        };

        if table.contains_key(&name) {
            shutdown_quietly(&mut handle);
            release_handle(handle, path);
            return Err(self.load_failed(
                trigger,
                partial.with_name(name.clone()),
                format!("Module with name '{name}' already loaded. Module names must be unique."),
            ));
        }

        let record = ModuleRecord::loaded(name.clone(), version, path);
        table.insert(
            name,
            LoadedModule {
                record: record.clone(),
                handle: Some(handle),
            },
        );
        Ok(record)
    }

    fn unload_locked(&self, table: &mut Table, name: &str, trigger: Trigger) -> ModuleResult {
        let Some(entry) = table.get_mut(name) else {
            if trigger == Trigger::Operator {
                self.notifier.notify(
                    ModuleEventKind::ErrorUnloading,
                    &ModuleRecord::from_name(name),
                    "Module not found for unloading.",
                );
            }
            return Err(ModuleError::not_found(format!("Module not found: {name}")));
        };

        let record = entry.record.clone();
        let Some(mut handle) = entry.handle.take() else {
            // Quarantined: the binary was already given up on.
            table.remove(name);
            tracing::warn!(module = %name, "Quarantined module removed from registry");
            return Ok(record.in_state(ModuleState::Unloaded));
        };

        if let Some(module) = handle.module_mut() {
            if let Err(e) = guarded_call(|| module.shutdown()) {
                let message = format!("Error during {name}->shutdown(): {e}");
                if trigger == Trigger::Teardown {
                    tracing::warn!(module = %name, "{message}");
                } else {
                    self.notifier
                        .notify(ModuleEventKind::ErrorUnloading, &record, &message);
                }
            }
        }

        if let Err(e) = handle.destroy_instance() {
            let message = format!("Error during {name} destruction: {e}");
            if trigger == Trigger::Teardown {
                tracing::warn!(module = %name, "{message}");
            } else {
                self.notifier
                    .notify(ModuleEventKind::ErrorUnloading, &record, &message);
            }
        }

        match handle.close() {
            Ok(()) => {
                table.remove(name);
                Ok(record.in_state(ModuleState::Unloaded))
            }
            Err(e) => {
                let message = format!("Failed to free library for module {name} (Error: {e})");
                let quarantined = record.in_state(ModuleState::Quarantined);
                if let Some(entry) = table.get_mut(name) {
                    entry.record = quarantined.clone();
                }
                match trigger {
                    Trigger::Operator => self.notifier.notify(
                        ModuleEventKind::ErrorUnloading,
                        &quarantined,
                        &message,
                    ),
                    Trigger::Reload => {}
                    Trigger::Teardown => tracing::error!(module = %name, "{message}"),
                }
                Err(ModuleError::failed(message, Some(quarantined)))
            }
        }
    }

    fn load_failed(&self, trigger: Trigger, record: ModuleRecord, message: String) -> ModuleError {
        match trigger {
            Trigger::Operator => {
                self.notifier
                    .notify(ModuleEventKind::ErrorLoading, &record, &message)
            }
            _ => tracing::debug!(path = %record.path.display(), "{message}"),
        }
        ModuleError::failed(message, Some(record))
    }
}

impl Drop for ModuleRegistry {
    fn drop(&mut self) {
        let mut table = std::mem::take(self.modules.get_mut());
        if !table.is_empty() {
            let removed = self.teardown(&mut table);
            tracing::debug!(count = removed.len(), "Modules unloaded on registry drop");
        }
    }
}

fn module_name(module: &(dyn LauncherModule + 'static)) -> String {
    guarded_value(|| module.name()).unwrap_or_default()
}

fn shutdown_quietly(handle: &mut ModuleHandle) {
    if let Some(module) = handle.module_mut() {
        if let Err(e) = guarded_call(|| module.shutdown()) {
            tracing::warn!(error = %e, "Module shutdown failed during load rollback");
        }
    }
}

fn release_handle(handle: ModuleHandle, path: &Path) {
    if let Err(e) = handle.close() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to close module binary during rollback");
    }
}

fn close_library(library: Box<dyn LibraryHandle>, path: &Path) {
    if let Err(e) = library.close() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to close module binary during rollback");
    }
}
