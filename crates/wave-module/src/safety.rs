//! Panic containment around calls into module code, and the raw-pointer
//! conversions behind the exported factory and destructor.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use crate::abi::{LauncherModule, ModuleInstance};

pub use wave_host::panic_message;

/// Runs `f`, turning a panic into an `Err` carrying the panic message.
pub fn guarded_call<T>(f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

/// Runs `f`, returning `None` if it panicked.
pub fn guarded_value<T>(f: impl FnOnce() -> T) -> Option<T> {
    catch_unwind(AssertUnwindSafe(f)).ok()
}

/// Constructs a module and leaks it as a raw instance pointer.
///
/// Returns null if the constructor panics.
pub fn instance_into_raw<M, F>(ctor: F) -> *mut ModuleInstance
where
    M: LauncherModule + 'static,
    F: FnOnce() -> M,
{
    match catch_unwind(AssertUnwindSafe(|| {
        let instance: ModuleInstance = Box::new(ctor());
        instance
    })) {
        Ok(instance) => Box::into_raw(Box::new(instance)),
        Err(payload) => {
            tracing::error!(
                panic = %panic_message(payload.as_ref()),
                "Module constructor panicked"
            );
            ptr::null_mut()
        }
    }
}

/// Drops an instance produced by [`instance_into_raw`]. Null is ignored and
/// a panicking `Drop` is contained.
///
/// Returns `false` when the instance's `Drop` panicked.
///
/// # Safety
///
/// `instance` must be null or a pointer returned by [`instance_into_raw`]
/// from the same binary that has not been dropped yet.
pub unsafe fn drop_raw_instance(instance: *mut ModuleInstance) -> bool {
    if instance.is_null() {
        return true;
    }
    let boxed = unsafe { Box::from_raw(instance) };
    match catch_unwind(AssertUnwindSafe(move || drop(boxed))) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                panic = %panic_message(payload.as_ref()),
                "Module destructor panicked"
            );
            false
        }
    }
}
