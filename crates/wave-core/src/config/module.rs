//! Module loader configuration.

use serde::{Deserialize, Serialize};

/// Module loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Directory scanned for module shared libraries at startup.
    #[serde(default = "default_module_directory")]
    pub directory: String,
    /// Whether to automatically load every module in `directory` on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Reject binaries that do not export `destroy_module_instance`.
    ///
    /// When `false`, such binaries are accepted and their instances are
    /// leaked on unload because the host cannot free them.
    #[serde(default = "default_true")]
    pub require_destructor: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            directory: default_module_directory(),
            auto_load: true,
            require_destructor: true,
        }
    }
}

fn default_module_directory() -> String {
    "./modules".to_string()
}

fn default_true() -> bool {
    true
}
