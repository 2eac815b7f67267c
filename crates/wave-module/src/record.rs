//! Module records, lifecycle events and operation errors.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wave_core::error::AppError;

/// Where a module record stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Loaded and initialized.
    Loaded,
    /// Unloaded, but its binary could not be closed. Stays in the table
    /// until unloaded again.
    Quarantined,
    /// Removed from the registry.
    Unloaded,
    /// Describes a module that failed to load (partial record).
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Quarantined => write!(f, "quarantined"),
            Self::Unloaded => write!(f, "unloaded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Metadata snapshot of a module.
///
/// Failure reports carry partial records: path only, or path and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Name reported by the module; empty when unknown.
    pub name: String,
    /// Version reported by the module; empty when unknown.
    pub version: String,
    /// Path the binary was loaded from; empty when unknown.
    pub path: PathBuf,
    /// When the module finished loading.
    pub loaded_at: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub state: ModuleState,
}

impl ModuleRecord {
    /// Record of a freshly loaded module.
    pub fn loaded(name: impl Into<String>, version: impl Into<String>, path: &Path) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.to_path_buf(),
            loaded_at: Some(Utc::now()),
            state: ModuleState::Loaded,
        }
    }

    /// Partial record knowing only the path.
    pub fn from_path(path: &Path) -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            path: path.to_path_buf(),
            loaded_at: None,
            state: ModuleState::Failed,
        }
    }

    /// Partial record knowing only the name.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::from_path(Path::new(""))
        }
    }

    /// Sets the name on a partial record.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns a copy in the given state.
    pub fn in_state(mut self, state: ModuleState) -> Self {
        self.state = state;
        self
    }
}

/// Kind of lifecycle event broadcast by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleEventKind {
    /// A module was loaded.
    Loaded,
    /// A module was unloaded.
    Unloaded,
    /// A module was reloaded.
    Reloaded,
    /// Loading failed.
    ErrorLoading,
    /// Unloading failed, or a fault occurred while unloading.
    ErrorUnloading,
}

impl ModuleEventKind {
    /// Returns `true` for the two error kinds.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ErrorLoading | Self::ErrorUnloading)
    }
}

impl fmt::Display for ModuleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Unloaded => write!(f, "unloaded"),
            Self::Reloaded => write!(f, "reloaded"),
            Self::ErrorLoading => write!(f, "error_loading"),
            Self::ErrorUnloading => write!(f, "error_unloading"),
        }
    }
}

/// Failure of a registry operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// No module with the requested name is loaded.
    #[error("{message}")]
    NotFound {
        /// Description.
        message: String,
    },
    /// The operation failed. Any rollback has already happened.
    #[error("{message}")]
    Failed {
        /// Description.
        message: String,
        /// Best-available record of the module involved.
        module: Option<ModuleRecord>,
    },
}

impl ModuleError {
    /// Not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Failure carrying the module involved.
    pub fn failed(message: impl Into<String>, module: Option<ModuleRecord>) -> Self {
        Self::Failed {
            message: message.into(),
            module,
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message } | Self::Failed { message, .. } => message,
        }
    }

    /// Record attached to a failure, if any.
    pub fn module(&self) -> Option<&ModuleRecord> {
        match self {
            Self::NotFound { .. } => None,
            Self::Failed { module, .. } => module.as_ref(),
        }
    }

    /// Returns `true` for [`ModuleError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ModuleError> for AppError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::NotFound { message } => AppError::not_found(message),
            ModuleError::Failed { message, .. } => AppError::module(message),
        }
    }
}
