//! INI-backed configuration store shared with modules.
//!
//! Values live in memory as `section -> key -> string`. The backing file is
//! parsed with the `config` crate; edits made through [`ConfigurationSystem::set_value`]
//! stay in memory and are announced to subscribers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use wave_core::error::AppError;
use wave_core::result::AppResult;

use crate::guarded;

type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Lookup failure for a single configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigLookupError {
    /// The section does not exist.
    #[error("Section not found.")]
    SectionNotFound,
    /// The section exists but does not contain the key.
    #[error("Key not found in section.")]
    KeyNotFound,
    /// The value exists but could not be parsed into the requested type.
    #[error("Value '{value}' could not be parsed.")]
    Parse {
        /// Raw stored value.
        value: String,
    },
}

/// Notification sent to configuration subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// A single value was set in memory.
    Changed {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
        /// New value.
        value: String,
    },
    /// The whole store was reloaded from its source file.
    Reloaded,
}

type ConfigCallback = Arc<dyn Fn(&ConfigEvent) + Send + Sync>;

/// Host configuration store.
pub struct ConfigurationSystem {
    data: RwLock<Sections>,
    source: RwLock<Option<PathBuf>>,
    subscribers: RwLock<Vec<ConfigCallback>>,
}

impl fmt::Debug for ConfigurationSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationSystem")
            .field("source", &*self.source.read())
            .field("sections", &self.data.read().len())
            .finish()
    }
}

impl ConfigurationSystem {
    /// Creates an empty store with no source file.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            source: RwLock::new(None),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Returns the raw value stored under `section.key`.
    pub fn get_value(&self, section: &str, key: &str) -> Result<String, ConfigLookupError> {
        let data = self.data.read();
        let entries = data
            .get(section)
            .ok_or(ConfigLookupError::SectionNotFound)?;
        entries
            .get(key)
            .cloned()
            .ok_or(ConfigLookupError::KeyNotFound)
    }

    /// Returns the value under `section.key` parsed into `T`.
    pub fn get<T: FromStr>(&self, section: &str, key: &str) -> Result<T, ConfigLookupError> {
        let raw = self.get_value(section, key)?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| ConfigLookupError::Parse { value: raw })
    }

    /// Returns the value under `section.key`, or `default` when missing or
    /// unparseable.
    pub fn get_or<T: FromStr>(&self, section: &str, key: &str, default: T) -> T {
        self.get(section, key).unwrap_or(default)
    }

    /// Sets a value in memory and notifies subscribers.
    pub fn set_value(&self, section: &str, key: &str, value: impl ToString) {
        let value = value.to_string();
        self.data
            .write()
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());

        self.notify(&ConfigEvent::Changed {
            section: section.to_string(),
            key: key.to_string(),
            value,
        });
    }

    /// Returns the names of all sections, sorted.
    pub fn sections(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Sets the file that [`reload_config`](Self::reload_config) reads.
    pub fn set_config_source(&self, path: impl Into<PathBuf>) {
        *self.source.write() = Some(path.into());
    }

    /// Returns the configured source file, if any.
    pub fn config_source(&self) -> Option<PathBuf> {
        self.source.read().clone()
    }

    /// Re-reads the source file, replacing all in-memory values.
    ///
    /// On failure the current values are left untouched.
    pub fn reload_config(&self) -> AppResult<()> {
        let path = self
            .config_source()
            .ok_or_else(|| AppError::configuration("No configuration source set"))?;

        let parsed = parse_ini(&path)?;
        *self.data.write() = parsed;

        tracing::debug!(path = %path.display(), "Configuration reloaded");
        self.notify(&ConfigEvent::Reloaded);
        Ok(())
    }

    /// Sets the source file and loads it.
    pub fn load_from(&self, path: impl Into<PathBuf>) -> AppResult<()> {
        self.set_config_source(path);
        self.reload_config()
    }

    /// Subscribes to configuration changes.
    pub fn subscribe(&self, callback: impl Fn(&ConfigEvent) + Send + Sync + 'static) {
        self.subscribers.write().push(Arc::new(callback));
    }

    fn notify(&self, event: &ConfigEvent) {
        let subscribers = self.subscribers.read().clone();
        for callback in &subscribers {
            if !guarded(|| callback(event)) {
                tracing::error!(?event, "Configuration subscriber panicked");
            }
        }
    }
}

impl Default for ConfigurationSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_ini(path: &Path) -> AppResult<Sections> {
    if !path.is_file() {
        return Err(AppError::not_found(format!(
            "Configuration file '{}' does not exist",
            path.display()
        )));
    }

    let name = path
        .to_str()
        .ok_or_else(|| AppError::configuration("Configuration path is not valid UTF-8"))?;

    let settings = config::Config::builder()
        .add_source(config::File::new(name, config::FileFormat::Ini))
        .build()?;

    Ok(settings.try_deserialize::<Sections>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_ini(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_lookup_outcomes() {
        let config = ConfigurationSystem::new();
        config.set_value("clipboard", "backend", "memory");

        assert_eq!(config.get_value("clipboard", "backend").unwrap(), "memory");
        assert_eq!(
            config.get_value("missing", "backend"),
            Err(ConfigLookupError::SectionNotFound)
        );
        assert_eq!(
            config.get_value("clipboard", "missing"),
            Err(ConfigLookupError::KeyNotFound)
        );
        assert_eq!(
            ConfigLookupError::SectionNotFound.to_string(),
            "Section not found."
        );
    }

    #[test]
    fn test_typed_get() {
        let config = ConfigurationSystem::new();
        config.set_value("clipboard", "history_size", 25);
        config.set_value("clipboard", "enabled", "yes");

        assert_eq!(config.get::<usize>("clipboard", "history_size").unwrap(), 25);
        assert!(matches!(
            config.get::<bool>("clipboard", "enabled"),
            Err(ConfigLookupError::Parse { .. })
        ));
        assert!(config.get_or("clipboard", "enabled", true));
    }

    #[test]
    fn test_set_value_notifies() {
        let config = ConfigurationSystem::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        config.subscribe(move |event| s.lock().push(event.clone()));

        config.set_value("core", "mode", "fast");

        assert_eq!(
            seen.lock().as_slice(),
            &[ConfigEvent::Changed {
                section: "core".into(),
                key: "mode".into(),
                value: "fast".into(),
            }]
        );
    }

    #[test]
    fn test_reload_from_ini() {
        let file = write_ini("[clipboard]\nbackend = system\nhistory_size = 5\n\n[core]\nname = wave\n");
        let config = ConfigurationSystem::new();
        let reloads = Arc::new(AtomicUsize::new(0));
        let r = reloads.clone();
        config.subscribe(move |event| {
            if *event == ConfigEvent::Reloaded {
                r.fetch_add(1, Ordering::SeqCst);
            }
        });

        config.set_value("stale", "key", "value");
        config.load_from(file.path()).unwrap();

        assert_eq!(config.get_value("clipboard", "backend").unwrap(), "system");
        assert_eq!(config.get::<u32>("clipboard", "history_size").unwrap(), 5);
        assert_eq!(config.get_value("core", "name").unwrap(), "wave");
        assert_eq!(
            config.get_value("stale", "key"),
            Err(ConfigLookupError::SectionNotFound)
        );
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reload_failure_keeps_data() {
        let config = ConfigurationSystem::new();
        config.set_value("core", "name", "wave");

        assert!(config.reload_config().is_err());

        config.set_config_source("/nonexistent/wave-settings.ini");
        let err = config.reload_config().unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(config.get_value("core", "name").unwrap(), "wave");
    }
}
