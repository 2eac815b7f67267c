//! Binding adapter over the platform loader (`dlopen` / `LoadLibrary`).

use std::path::{Path, PathBuf};

use crate::abi::{
    CREATE_MODULE_FN_NAME, CREATE_MODULE_SYMBOL, CreateModuleFn, DESTROY_MODULE_FN_NAME,
    DESTROY_MODULE_SYMBOL, DestroyModuleFn,
};

use super::{LibraryHandle, ModuleBinder};

/// Loads modules from shared libraries (.so / .dll / .dylib).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBinder;

impl NativeBinder {
    /// Creates a native binder.
    pub fn new() -> Self {
        Self
    }
}

impl ModuleBinder for NativeBinder {
    fn open(&self, path: &Path) -> Result<Box<dyn LibraryHandle>, String> {
        // SAFETY: loading a library runs its initialisers. Only trusted
        // module directories should be configured.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| e.to_string())?;

        tracing::debug!(path = %path.display(), "Native library opened");

        Ok(Box::new(NativeLibrary {
            path: path.to_path_buf(),
            library,
        }))
    }
}

/// An open shared library.
#[derive(Debug)]
pub struct NativeLibrary {
    path: PathBuf,
    library: libloading::Library,
}

impl LibraryHandle for NativeLibrary {
    fn resolve_factory(&self) -> Result<CreateModuleFn, String> {
        // SAFETY: the symbol type is fixed by the module ABI.
        let symbol = unsafe { self.library.get::<CreateModuleFn>(CREATE_MODULE_SYMBOL) }
            .map_err(|e| format!("'{CREATE_MODULE_FN_NAME}': {e}"))?;
        Ok(*symbol)
    }

    fn resolve_destructor(&self) -> Result<DestroyModuleFn, String> {
        // SAFETY: the symbol type is fixed by the module ABI.
        let symbol = unsafe { self.library.get::<DestroyModuleFn>(DESTROY_MODULE_SYMBOL) }
            .map_err(|e| format!("'{DESTROY_MODULE_FN_NAME}': {e}"))?;
        Ok(*symbol)
    }

    fn close(self: Box<Self>) -> Result<(), String> {
        let NativeLibrary { path, library } = *self;
        library.close().map_err(|e| e.to_string())?;
        tracing::debug!(path = %path.display(), "Native library closed");
        Ok(())
    }
}
