//! Host subsystem configuration.

use serde::{Deserialize, Serialize};

/// Settings for the host's own subsystems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// INI file backing the host configuration store exposed to modules.
    #[serde(default)]
    pub settings_file: Option<String>,
}
