//! Lifecycle tests for the module registry over the mock binding adapter.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde_json::json;

use wave_host::DeliveryMode;
use wave_module::abi::ModuleInstance;
use wave_module::mock::{MockBinder, MockCore, MockLibrary};
use wave_module::{CoreAccess, LauncherModule, ModuleEventKind, ModuleState};

// ── Test modules ────────────────────────────────────────────────────

trait Behavior: Send + 'static {
    const NAME: &'static str;
    const VERSION: &'static str = "1.0";

    fn on_initialize() -> Result<(), String> {
        Ok(())
    }

    fn on_shutdown() -> Result<(), String> {
        Ok(())
    }

    fn on_drop() {}
}

/// Module reporting each lifecycle step on the host bus as `probe` events.
struct Probe<B: Behavior> {
    core: Option<Arc<dyn CoreAccess>>,
    _behavior: PhantomData<B>,
}

impl<B: Behavior> Default for Probe<B> {
    fn default() -> Self {
        Self {
            core: None,
            _behavior: PhantomData,
        }
    }
}

impl<B: Behavior> Probe<B> {
    fn report(&self, step: &str) {
        if let Some(core) = &self.core {
            core.event_bus().publish(
                "probe",
                json!({ "step": step, "name": B::NAME, "version": B::VERSION }),
                DeliveryMode::Sync,
            );
        }
    }
}

impl<B: Behavior> LauncherModule for Probe<B> {
    fn initialize(&mut self, core: Arc<dyn CoreAccess>) -> Result<(), String> {
        self.core = Some(core);
        self.report("init");
        B::on_initialize()
    }

    fn shutdown(&mut self) -> Result<(), String> {
        self.report("shutdown");
        B::on_shutdown()
    }

    fn name(&self) -> String {
        B::NAME.to_string()
    }

    fn version(&self) -> String {
        B::VERSION.to_string()
    }
}

impl<B: Behavior> Drop for Probe<B> {
    fn drop(&mut self) {
        self.report("drop");
        B::on_drop();
    }
}

struct EchoV1;
impl Behavior for EchoV1 {
    const NAME: &'static str = "Echo";
}

struct EchoV2;
impl Behavior for EchoV2 {
    const NAME: &'static str = "Echo";
    const VERSION: &'static str = "2.0";
}

struct Other;
impl Behavior for Other {
    const NAME: &'static str = "Other";
}

struct FailingInit;
impl Behavior for FailingInit {
    const NAME: &'static str = "Broken";
    fn on_initialize() -> Result<(), String> {
        Err("database unavailable".into())
    }
}

struct PanickingInit;
impl Behavior for PanickingInit {
    const NAME: &'static str = "Panicky";
    fn on_initialize() -> Result<(), String> {
        panic!("init exploded")
    }
}

struct FailingShutdown;
impl Behavior for FailingShutdown {
    const NAME: &'static str = "Stubborn";
    fn on_shutdown() -> Result<(), String> {
        Err("still busy".into())
    }
}

struct PanickingShutdown;
impl Behavior for PanickingShutdown {
    const NAME: &'static str = "Crashy";
    fn on_shutdown() -> Result<(), String> {
        panic!("shutdown exploded")
    }
}

struct PanickingDrop;
impl Behavior for PanickingDrop {
    const NAME: &'static str = "Fragile";
    fn on_drop() {
        panic!("drop exploded")
    }
}

struct PanickingConstructor;

impl Default for PanickingConstructor {
    fn default() -> Self {
        panic!("constructor exploded")
    }
}

impl LauncherModule for PanickingConstructor {
    fn initialize(&mut self, _core: Arc<dyn CoreAccess>) -> Result<(), String> {
        Ok(())
    }
    fn shutdown(&mut self) -> Result<(), String> {
        Ok(())
    }
    fn name(&self) -> String {
        "Never".into()
    }
    fn version(&self) -> String {
        "0".into()
    }
}

#[allow(improper_ctypes_definitions)]
extern "C" fn null_factory() -> *mut ModuleInstance {
    std::ptr::null_mut()
}

// ── Fixtures ────────────────────────────────────────────────────────

type EventLog = Arc<Mutex<Vec<(ModuleEventKind, String, String)>>>;

fn record_events(core: &MockCore) -> EventLog {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let l = log.clone();
    core.registry().subscribe(move |kind, record, message| {
        l.lock()
            .push((kind, record.name.clone(), message.to_string()));
    });
    log
}

fn record_probes(core: &MockCore) -> Arc<Mutex<Vec<String>>> {
    let probes = Arc::new(Mutex::new(Vec::new()));
    let p = probes.clone();
    core.event_bus().subscribe(
        "probe",
        move |payload| {
            p.lock().push(format!(
                "{}:{}:{}",
                payload["step"].as_str().unwrap_or_default(),
                payload["name"].as_str().unwrap_or_default(),
                payload["version"].as_str().unwrap_or_default(),
            ));
        },
        DeliveryMode::Sync,
    );
    probes
}

fn kinds(log: &EventLog) -> Vec<ModuleEventKind> {
    log.lock().iter().map(|(kind, _, _)| *kind).collect()
}

fn host() -> (Arc<MockBinder>, Arc<MockCore>) {
    let binder = Arc::new(MockBinder::new());
    binder.register("echo.so", MockLibrary::of::<Probe<EchoV1>>());
    let core = MockCore::new(binder.clone());
    (binder, core)
}

// ── Load / unload ───────────────────────────────────────────────────

#[test]
fn test_echo_load_unload_scenario() {
    let (binder, core) = host();
    let registry = core.registry();
    let events = record_events(&core);

    let record = registry.load("echo.so").unwrap();
    assert_eq!(record.name, "Echo");
    assert_eq!(record.version, "1.0");
    assert_eq!(record.path, PathBuf::from("echo.so"));
    assert_eq!(registry.list().len(), 1);

    let err = registry.load("echo.so").unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.message().contains("already loaded"));

    registry.unload("Echo").unwrap();
    assert!(registry.list().is_empty());

    let err = registry.unload("Echo").unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(
        kinds(&events),
        vec![
            ModuleEventKind::Loaded,
            ModuleEventKind::Unloaded,
            ModuleEventKind::ErrorUnloading,
        ]
    );
    assert_eq!(events.lock()[2].2, "Module not found for unloading.");
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_duplicate_name_releases_new_handle() {
    let (binder, core) = host();
    binder.register("echo2.so", MockLibrary::of::<Probe<EchoV2>>());
    let registry = core.registry();
    let probes = record_probes(&core);
    let events = record_events(&core);

    registry.load("echo.so").unwrap();
    let err = registry.load("echo2.so").unwrap_err();

    assert!(err.message().contains("Module names must be unique"));
    let partial = err.module().unwrap();
    assert_eq!(partial.name, "Echo");
    assert_eq!(partial.path, PathBuf::from("echo2.so"));

    assert_eq!(registry.count(), 1);
    assert_eq!(registry.get("Echo").unwrap().version, "1.0");
    assert_eq!(binder.open_handles(), 1);
    assert_eq!(
        probes.lock().as_slice(),
        &[
            "init:Echo:1.0".to_string(),
            "init:Echo:2.0".to_string(),
            "shutdown:Echo:2.0".to_string(),
            "drop:Echo:2.0".to_string(),
        ]
    );
    assert_eq!(
        kinds(&events),
        vec![ModuleEventKind::Loaded, ModuleEventKind::ErrorLoading]
    );

    registry.unload("Echo").unwrap();
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_unload_then_load_yields_fresh_instance() {
    let (binder, core) = host();
    let registry = core.registry();
    let probes = record_probes(&core);

    let first = registry.load("echo.so").unwrap();
    registry.unload("Echo").unwrap();
    let second = registry.load("echo.so").unwrap();

    assert_eq!(first.name, second.name);
    assert_eq!(binder.total_opens(), 2);
    assert_eq!(
        probes
            .lock()
            .iter()
            .filter(|p| p.starts_with("init:"))
            .count(),
        2
    );

    registry.unload("Echo").unwrap();
}

#[test]
fn test_open_failure_reports_path() {
    let (binder, core) = host();
    let events = record_events(&core);

    let err = core.registry().load("missing.so").unwrap_err();
    assert!(err.message().starts_with("Failed to load library: missing.so"));
    let partial = err.module().unwrap();
    assert_eq!(partial.path, PathBuf::from("missing.so"));
    assert!(partial.name.is_empty());
    assert_eq!(partial.state, ModuleState::Failed);
    assert_eq!(kinds(&events), vec![ModuleEventKind::ErrorLoading]);
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_missing_factory_closes_binary() {
    let (binder, core) = host();
    binder.register("empty.so", MockLibrary::empty());

    let err = core.registry().load("empty.so").unwrap_err();
    assert!(err.message().contains("create_module_instance"));
    assert_eq!(binder.total_opens(), 1);
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_null_and_panicking_factories_fail() {
    let (binder, core) = host();
    binder.register("null.so", MockLibrary::with_factory(null_factory));
    binder.register("ctor.so", MockLibrary::of::<PanickingConstructor>());
    let registry = core.registry();

    let err = registry.load("null.so").unwrap_err();
    assert!(err.message().contains("returned null"));

    let err = registry.load("ctor.so").unwrap_err();
    assert!(err.message().contains("returned null"));

    assert_eq!(registry.count(), 0);
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_initialize_failure_rolls_back() {
    let (binder, core) = host();
    binder.register("broken.so", MockLibrary::of::<Probe<FailingInit>>());
    binder.register("panicky.so", MockLibrary::of::<Probe<PanickingInit>>());
    let registry = core.registry();
    let probes = record_probes(&core);
    let events = record_events(&core);

    let err = registry.load("broken.so").unwrap_err();
    assert_eq!(
        err.message(),
        "Module Broken initialize() failed: database unavailable"
    );
    assert_eq!(err.module().unwrap().name, "Broken");

    let err = registry.load("panicky.so").unwrap_err();
    assert!(err.message().contains("init exploded"));

    assert_eq!(registry.count(), 0);
    assert_eq!(binder.open_handles(), 0);
    assert!(probes.lock().contains(&"drop:Broken:1.0".to_string()));
    assert!(probes.lock().contains(&"drop:Panicky:1.0".to_string()));
    assert_eq!(
        kinds(&events),
        vec![ModuleEventKind::ErrorLoading, ModuleEventKind::ErrorLoading]
    );
}

// ── Shutdown faults ─────────────────────────────────────────────────

#[test]
fn test_shutdown_error_still_unloads() {
    let (binder, core) = host();
    binder.register("stubborn.so", MockLibrary::of::<Probe<FailingShutdown>>());
    let registry = core.registry();
    let events = record_events(&core);

    registry.load("stubborn.so").unwrap();
    registry.unload("Stubborn").unwrap();

    assert_eq!(registry.count(), 0);
    assert_eq!(binder.open_handles(), 0);
    assert_eq!(
        kinds(&events),
        vec![
            ModuleEventKind::Loaded,
            ModuleEventKind::ErrorUnloading,
            ModuleEventKind::Unloaded,
        ]
    );
    assert!(events.lock()[1].2.contains("still busy"));
}

#[test]
fn test_shutdown_panic_still_unloads() {
    let (binder, core) = host();
    binder.register("crashy.so", MockLibrary::of::<Probe<PanickingShutdown>>());
    let registry = core.registry();
    let probes = record_probes(&core);
    let events = record_events(&core);

    registry.load("crashy.so").unwrap();
    let record = registry.unload("Crashy").unwrap();

    assert_eq!(record.state, ModuleState::Unloaded);
    assert!(!registry.contains("Crashy"));
    assert_eq!(binder.open_handles(), 0);
    assert!(probes.lock().contains(&"drop:Crashy:1.0".to_string()));
    assert!(kinds(&events).contains(&ModuleEventKind::ErrorUnloading));
}

#[test]
fn test_destructor_fault_reported_and_unload_completes() {
    let (binder, core) = host();
    binder.register("fragile.so", MockLibrary::of::<Probe<PanickingDrop>>());
    let registry = core.registry();
    let events = record_events(&core);

    registry.load("fragile.so").unwrap();
    let record = registry.unload("Fragile").unwrap();

    assert_eq!(record.state, ModuleState::Unloaded);
    assert!(!registry.contains("Fragile"));
    assert_eq!(binder.open_handles(), 0);
    assert_eq!(
        kinds(&events),
        vec![
            ModuleEventKind::Loaded,
            ModuleEventKind::ErrorUnloading,
            ModuleEventKind::Unloaded,
        ]
    );
    assert!(events.lock()[1].2.contains("Fragile destruction"));
}

#[test]
fn test_destructor_fault_quiet_during_teardown() {
    let (binder, core) = host();
    binder.register("fragile.so", MockLibrary::of::<Probe<PanickingDrop>>());
    let registry = core.registry();
    let events = record_events(&core);

    registry.load("fragile.so").unwrap();
    assert_eq!(registry.unload_all(), vec!["Fragile".to_string()]);

    assert_eq!(registry.count(), 0);
    assert_eq!(binder.open_handles(), 0);
    assert!(!kinds(&events).contains(&ModuleEventKind::ErrorUnloading));
}

// ── Destructor policy ───────────────────────────────────────────────

#[test]
fn test_missing_destructor_rejected_by_default() {
    let (binder, core) = host();
    binder.register(
        "nodtor.so",
        MockLibrary::of::<Probe<Other>>().without_destructor(),
    );

    let err = core.registry().load("nodtor.so").unwrap_err();
    assert!(err.message().contains("destroy_module_instance"));
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_missing_destructor_tolerated_when_allowed() {
    let binder = Arc::new(MockBinder::new());
    binder.register(
        "nodtor.so",
        MockLibrary::of::<Probe<Other>>().without_destructor(),
    );
    let core = MockCore::with_require_destructor(binder.clone(), false);
    let registry = core.registry();
    let probes = record_probes(&core);
    let events = record_events(&core);

    registry.load("nodtor.so").unwrap();
    registry.unload("Other").unwrap();

    assert_eq!(registry.count(), 0);
    assert_eq!(
        kinds(&events),
        vec![
            ModuleEventKind::Loaded,
            ModuleEventKind::ErrorUnloading,
            ModuleEventKind::Unloaded,
        ]
    );
    assert!(events.lock()[1].2.contains("instance leaked"));
    assert_eq!(binder.open_handles(), 0);
    // The instance is leaked, never dropped.
    assert_eq!(
        probes.lock().as_slice(),
        &["init:Other:1.0".to_string(), "shutdown:Other:1.0".to_string()]
    );
}

// ── Quarantine ──────────────────────────────────────────────────────

#[test]
fn test_close_failure_quarantines_then_force_removes() {
    let (binder, core) = host();
    binder.register(
        "sticky.so",
        MockLibrary::of::<Probe<Other>>().failing_close("device busy"),
    );
    let registry = core.registry();
    let events = record_events(&core);

    registry.load("sticky.so").unwrap();

    let err = registry.unload("Other").unwrap_err();
    assert!(err.message().contains("device busy"));
    assert_eq!(err.module().unwrap().state, ModuleState::Quarantined);
    assert_eq!(registry.get("Other").unwrap().state, ModuleState::Quarantined);

    let err = registry.load("sticky.so").unwrap_err();
    assert!(err.message().contains("already loaded"));

    let record = registry.unload("Other").unwrap();
    assert_eq!(record.state, ModuleState::Unloaded);
    assert_eq!(registry.count(), 0);

    assert_eq!(
        kinds(&events),
        vec![
            ModuleEventKind::Loaded,
            ModuleEventKind::ErrorUnloading,
            ModuleEventKind::Unloaded,
        ]
    );
    // The failed close consumed the handle; it is not retried.
    assert_eq!(binder.open_handles(), 1);
}

// ── Reload ──────────────────────────────────────────────────────────

#[test]
fn test_reload_emits_single_event() {
    let (binder, core) = host();
    let registry = core.registry();
    let events = record_events(&core);
    let probes = record_probes(&core);

    registry.load("echo.so").unwrap();
    binder.register("echo.so", MockLibrary::of::<Probe<EchoV2>>());

    let record = registry.reload("Echo").unwrap();
    assert_eq!(record.version, "2.0");
    assert_eq!(record.path, PathBuf::from("echo.so"));
    assert_eq!(registry.count(), 1);

    assert_eq!(
        kinds(&events),
        vec![ModuleEventKind::Loaded, ModuleEventKind::Reloaded]
    );
    assert_eq!(
        probes.lock().as_slice(),
        &[
            "init:Echo:1.0".to_string(),
            "shutdown:Echo:1.0".to_string(),
            "drop:Echo:1.0".to_string(),
            "init:Echo:2.0".to_string(),
        ]
    );

    registry.unload("Echo").unwrap();
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_reload_unknown_name_touches_nothing() {
    let (binder, core) = host();
    let registry = core.registry();
    registry.load("echo.so").unwrap();
    let events = record_events(&core);

    let err = registry.reload("Ghost").unwrap_err();
    assert!(err.is_not_found());
    assert!(events.lock().is_empty());
    assert_eq!(registry.count(), 1);
    assert_eq!(binder.total_opens(), 1);

    registry.unload_all();
}

#[test]
fn test_reload_load_phase_failure() {
    let (binder, core) = host();
    let registry = core.registry();
    registry.load("echo.so").unwrap();
    let events = record_events(&core);

    binder.register("echo.so", MockLibrary::empty());
    let err = registry.reload("Echo").unwrap_err();

    assert!(err.message().starts_with("Reload failed during load phase"));
    let partial = err.module().unwrap();
    assert_eq!(partial.name, "Echo");
    assert_eq!(partial.path, PathBuf::from("echo.so"));
    assert_eq!(registry.count(), 0);
    assert_eq!(kinds(&events), vec![ModuleEventKind::ErrorLoading]);
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_reload_unload_phase_failure() {
    let (binder, core) = host();
    binder.register(
        "sticky.so",
        MockLibrary::of::<Probe<Other>>().failing_close("device busy"),
    );
    let registry = core.registry();
    registry.load("sticky.so").unwrap();
    let events = record_events(&core);

    let err = registry.reload("Other").unwrap_err();
    assert!(err.message().starts_with("Reload failed during unload phase"));
    assert_eq!(registry.get("Other").unwrap().state, ModuleState::Quarantined);
    assert_eq!(kinds(&events), vec![ModuleEventKind::ErrorUnloading]);
    assert!(events.lock()[0].2.contains("during reload"));
}

// ── Notifier ────────────────────────────────────────────────────────

#[test]
fn test_panicking_subscriber_does_not_block_others() {
    let (_binder, core) = host();
    let registry = core.registry();
    registry.subscribe(|_, _, _| panic!("subscriber bug"));
    let events = record_events(&core);

    let first = registry.subscribe(|_, _, _| {});
    let second = registry.subscribe(|_, _, _| {});
    assert!(second > first);

    registry.load("echo.so").unwrap();
    assert_eq!(kinds(&events), vec![ModuleEventKind::Loaded]);

    registry.unload("Echo").unwrap();
}

// ── Concurrency ─────────────────────────────────────────────────────

#[test]
fn test_concurrent_loads_of_same_path() {
    let (binder, core) = host();
    let registry = core.registry().clone();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || registry.load("echo.so"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 7);
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(failure.message().contains("already loaded"));
    }

    registry.unload(&successes[0].name).unwrap();
    assert_eq!(registry.count(), 0);
    assert_eq!(binder.open_handles(), 0);
}

// ── Directory loading ───────────────────────────────────────────────

#[test]
fn test_load_directory_picks_shared_libraries() {
    let dir = tempfile::tempdir().unwrap();
    let ext = std::env::consts::DLL_EXTENSION;
    let a = dir.path().join(format!("a.{ext}"));
    let b = dir.path().join(format!("b.{ext}"));
    for path in [&a, &b] {
        std::fs::write(path, b"").unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

    let binder = Arc::new(MockBinder::new());
    binder.register(a.clone(), MockLibrary::of::<Probe<EchoV1>>());
    binder.register(b.clone(), MockLibrary::of::<Probe<Other>>());
    let core = MockCore::new(binder.clone());
    let registry = core.registry();

    let results = registry.load_directory(dir.path()).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, a);
    assert_eq!(results[1].0, b);
    assert!(results.iter().all(|(_, r)| r.is_ok()));

    let names: Vec<_> = registry.list().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Echo".to_string(), "Other".to_string()]);

    registry.unload_all();
    assert_eq!(binder.open_handles(), 0);
}

#[test]
fn test_load_directory_missing_dir_is_error() {
    let (_binder, core) = host();
    let err = core
        .registry()
        .load_directory("/nonexistent/wave-modules")
        .unwrap_err();
    assert_eq!(err.kind, wave_core::ErrorKind::Io);
}
