//! In-memory binding adapter and host for tests and statically linked
//! modules.
//!
//! `MockBinder` maps paths to in-process entry points instead of opening
//! files, and counts open handles so leaks are observable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use wave_host::{CommandEngine, ConfigurationSystem, EventBus, LoggingSystem};

use crate::abi::{
    CREATE_MODULE_FN_NAME, CreateModuleFn, DESTROY_MODULE_FN_NAME, DestroyModuleFn,
    LauncherModule, ModuleInstance,
};
use crate::api::context::CoreAccess;
use crate::binding::{LibraryHandle, ModuleBinder};
use crate::registry::ModuleRegistry;
use crate::safety::{drop_raw_instance, instance_into_raw};

/// Factory for a `Default`-constructible module.
#[allow(improper_ctypes_definitions)]
pub extern "C" fn mock_factory<M: LauncherModule + Default + 'static>() -> *mut ModuleInstance {
    instance_into_raw(M::default)
}

/// Destructor matching [`mock_factory`].
///
/// # Safety
///
/// `instance` must come from [`mock_factory`] and not have been destroyed.
#[allow(improper_ctypes_definitions)]
pub unsafe extern "C" fn mock_destructor(instance: *mut ModuleInstance) -> bool {
    unsafe { drop_raw_instance(instance) }
}

/// Entry points and failure switches of one mock binary.
#[derive(Debug, Clone)]
pub struct MockLibrary {
    factory: Option<CreateModuleFn>,
    destructor: Option<DestroyModuleFn>,
    open_error: Option<String>,
    close_error: Option<String>,
}

impl MockLibrary {
    /// Binary exporting factory and destructor for `M`.
    pub fn of<M: LauncherModule + Default + 'static>() -> Self {
        Self::with_factory(mock_factory::<M>)
    }

    /// Binary exporting `factory` and the standard destructor.
    pub fn with_factory(factory: CreateModuleFn) -> Self {
        Self {
            factory: Some(factory),
            destructor: Some(mock_destructor),
            open_error: None,
            close_error: None,
        }
    }

    /// Binary exporting neither symbol.
    pub fn empty() -> Self {
        Self {
            factory: None,
            destructor: None,
            open_error: None,
            close_error: None,
        }
    }

    /// Replaces the destructor export.
    pub fn with_destructor(mut self, destructor: DestroyModuleFn) -> Self {
        self.destructor = Some(destructor);
        self
    }

    /// Removes the destructor export.
    pub fn without_destructor(mut self) -> Self {
        self.destructor = None;
        self
    }

    /// Makes opening the binary fail.
    pub fn failing_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Makes closing the binary fail.
    pub fn failing_close(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    libraries: RwLock<HashMap<PathBuf, MockLibrary>>,
    open_handles: AtomicUsize,
    total_opens: AtomicUsize,
}

/// Binding adapter over registered [`MockLibrary`] entries.
#[derive(Debug, Default)]
pub struct MockBinder {
    state: Arc<MockState>,
}

impl MockBinder {
    /// Creates a binder with no binaries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the binary served at `path`. Open handles
    /// see the replacement on their next symbol lookup.
    pub fn register(&self, path: impl Into<PathBuf>, library: MockLibrary) {
        self.state.libraries.write().insert(path.into(), library);
    }

    /// Removes the binary at `path`.
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.state.libraries.write().remove(path.as_ref());
    }

    /// Handles opened and not yet successfully closed.
    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    /// Number of successful opens so far.
    pub fn total_opens(&self) -> usize {
        self.state.total_opens.load(Ordering::SeqCst)
    }
}

impl ModuleBinder for MockBinder {
    fn open(&self, path: &Path) -> Result<Box<dyn LibraryHandle>, String> {
        let libraries = self.state.libraries.read();
        let library = libraries
            .get(path)
            .ok_or_else(|| format!("{}: cannot open shared object file", path.display()))?;
        if let Some(e) = &library.open_error {
            return Err(e.clone());
        }

        self.state.open_handles.fetch_add(1, Ordering::SeqCst);
        self.state.total_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            path: path.to_path_buf(),
            state: self.state.clone(),
        }))
    }
}

#[derive(Debug)]
struct MockHandle {
    path: PathBuf,
    state: Arc<MockState>,
}

impl MockHandle {
    fn library(&self) -> Result<MockLibrary, String> {
        self.state
            .libraries
            .read()
            .get(&self.path)
            .cloned()
            .ok_or_else(|| format!("{}: binary removed", self.path.display()))
    }
}

impl LibraryHandle for MockHandle {
    fn resolve_factory(&self) -> Result<CreateModuleFn, String> {
        self.library()?
            .factory
            .ok_or_else(|| format!("undefined symbol: {CREATE_MODULE_FN_NAME}"))
    }

    fn resolve_destructor(&self) -> Result<DestroyModuleFn, String> {
        self.library()?
            .destructor
            .ok_or_else(|| format!("undefined symbol: {DESTROY_MODULE_FN_NAME}"))
    }

    fn close(self: Box<Self>) -> Result<(), String> {
        if let Some(e) = self.library().ok().and_then(|l| l.close_error) {
            return Err(e);
        }
        self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Minimal host: one of each subsystem plus a registry over a
/// [`MockBinder`].
#[derive(Debug)]
pub struct MockCore {
    logging: Arc<LoggingSystem>,
    configuration: Arc<ConfigurationSystem>,
    event_bus: Arc<EventBus>,
    commands: Arc<CommandEngine>,
    registry: Arc<ModuleRegistry>,
}

impl MockCore {
    /// Creates a host whose registry requires module destructors.
    pub fn new(binder: Arc<MockBinder>) -> Arc<Self> {
        Self::with_require_destructor(binder, true)
    }

    /// Creates a host with the given destructor policy.
    pub fn with_require_destructor(binder: Arc<MockBinder>, require: bool) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<MockCore>| {
            let core: Weak<dyn CoreAccess> = weak.clone();
            let binder: Arc<dyn ModuleBinder> = binder;
            Self {
                logging: Arc::new(LoggingSystem::new()),
                configuration: Arc::new(ConfigurationSystem::new()),
                event_bus: Arc::new(EventBus::new()),
                commands: Arc::new(CommandEngine::new()),
                registry: Arc::new(
                    ModuleRegistry::new(binder, core).with_require_destructor(require),
                ),
            }
        })
    }

    /// The host's registry.
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }
}

impl CoreAccess for MockCore {
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
        Some(self.registry.clone())
    }
}
