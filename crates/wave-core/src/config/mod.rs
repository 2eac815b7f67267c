//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod host;
pub mod logging;
pub mod module;

use std::path::Path;

use serde::{Deserialize, Serialize};

use self::host::HostConfig;
use self::logging::LoggingConfig;
use self::module::ModuleConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default file + environment overlay + `WAVE__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Module loader settings.
    #[serde(default)]
    pub modules: ModuleConfig,
    /// Host subsystem settings.
    #[serde(default)]
    pub host: HostConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// `base` names the default file (extension optional, defaults to
    /// `config/default`). An overlay `config/<env>` is merged on top when it
    /// exists, followed by environment variables prefixed with `WAVE__`
    /// (for example `WAVE__MODULES__DIRECTORY`).
    pub fn load(base: Option<&Path>, env: &str) -> Result<Self, AppError> {
        let base = base
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config/default".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(&base).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("WAVE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
