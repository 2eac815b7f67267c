//! Owned native handle + module instance.

use std::fmt;
use std::ptr::NonNull;

use crate::abi::{DESTROY_MODULE_FN_NAME, LauncherModule, ModuleInstance};
use crate::binding::LibraryHandle;

/// Exclusively owns an open module binary and the instance it produced.
///
/// Dropping the handle destroys the instance through the binary's
/// destructor and closes the binary, best effort. The registry tears
/// handles down explicitly with [`destroy_instance`](Self::destroy_instance)
/// and [`close`](Self::close) so it can report failures.
pub struct ModuleHandle {
    library: Option<Box<dyn LibraryHandle>>,
    instance: Option<NonNull<ModuleInstance>>,
}

// SAFETY: `LauncherModule: Send`, so the boxed instance may move between
// threads; the library handle is `Send` by trait bound. The pointer is
// only dereferenced through `&self`/`&mut self`.
unsafe impl Send for ModuleHandle {}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("library", &self.library)
            .field("has_instance", &self.instance.is_some())
            .finish()
    }
}

impl ModuleHandle {
    /// Takes ownership of an open binary and the instance its factory
    /// returned.
    pub fn new(library: Box<dyn LibraryHandle>, instance: NonNull<ModuleInstance>) -> Self {
        Self {
            library: Some(library),
            instance: Some(instance),
        }
    }

    /// The module instance, until it is destroyed.
    pub fn module(&self) -> Option<&(dyn LauncherModule + 'static)> {
        // SAFETY: the pointer came from the binary's factory and is valid
        // until `destroy_instance` takes it.
        self.instance.map(|ptr| unsafe { &**ptr.as_ptr() })
    }

    /// Mutable access to the module instance, until it is destroyed.
    pub fn module_mut(&mut self) -> Option<&mut (dyn LauncherModule + 'static)> {
        // SAFETY: as in `module`; `&mut self` guarantees exclusivity.
        self.instance.map(|ptr| unsafe { &mut **ptr.as_ptr() })
    }

    /// Returns `true` while the instance has not been destroyed.
    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Destroys the instance through `destroy_module_instance`, resolved
    /// afresh from the still-open binary.
    ///
    /// Fails when the binary exports no destructor, in which case the
    /// instance is leaked since the module's allocator owns it, or when
    /// the destructor reports a fault. The instance is gone either way.
    pub fn destroy_instance(&mut self) -> Result<(), String> {
        let Some(ptr) = self.instance.take() else {
            return Ok(());
        };

        let destructor = self
            .library
            .as_ref()
            .and_then(|library| library.resolve_destructor().ok());

        let Some(destroy) = destructor else {
            return Err(format!(
                "binary exports no {DESTROY_MODULE_FN_NAME}, instance leaked"
            ));
        };

        // SAFETY: `ptr` came from this binary's factory and is destroyed
        // exactly once.
        if unsafe { destroy(ptr.as_ptr()) } {
            Ok(())
        } else {
            Err(format!("{DESTROY_MODULE_FN_NAME} reported a fault"))
        }
    }

    /// Destroys the instance if still present, then closes the binary.
    ///
    /// Only a failure to close is returned; a destructor fault is logged.
    pub fn close(mut self) -> Result<(), String> {
        if let Err(e) = self.destroy_instance() {
            tracing::warn!(error = %e, "Module instance not destroyed cleanly");
        }
        match self.library.take() {
            Some(library) => library.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        if let Err(e) = self.destroy_instance() {
            tracing::warn!(error = %e, "Module instance not destroyed cleanly on drop");
        }
        if let Some(library) = self.library.take() {
            if let Err(e) = library.close() {
                tracing::warn!(error = %e, "Failed to close module binary on drop");
            }
        }
    }
}
