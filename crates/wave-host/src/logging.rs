//! Leveled, per-category logging system.
//!
//! Accepted entries are forwarded to `tracing` with a `category` field,
//! optionally mirrored to a log file, and broadcast to subscribers.

use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wave_core::error::AppError;
use wave_core::result::AppResult;

use crate::guarded;

/// Category whose level applies when a category has no explicit level.
pub const DEFAULT_CATEGORY: &str = "default";

/// Severity of a log entry. `None` disables a category entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operational messages.
    Info,
    /// Something unexpected that did not stop the operation.
    Warning,
    /// An operation failed.
    Error,
    /// Disables logging for a category.
    None,
}

impl LogLevel {
    /// Upper-case name used in formatted log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "none" | "off" => Ok(Self::None),
            other => Err(AppError::validation(format!("Unknown log level '{other}'"))),
        }
    }
}

/// A single log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was created.
    pub timestamp: DateTime<Local>,
    /// Severity.
    pub level: LogLevel,
    /// Category used for level filtering (usually a subsystem or module name).
    pub category: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured data attached to the entry.
    pub data: Option<Value>,
}

impl LogEntry {
    /// Creates an entry stamped with the current local time.
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            category: category.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data to the entry.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Formats the entry as a single log line.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.category,
            self.message
        );
        match &self.data {
            Some(Value::String(s)) => line.push_str(&format!(" {{Data: {s}}}")),
            Some(other) => line.push_str(&format!(" {{Data: {other}}}")),
            None => {}
        }
        line
    }
}

/// Callback invoked for every accepted log entry.
pub type LogCallback = Arc<dyn Fn(&LogEntry) + Send + Sync>;

struct LoggingState {
    levels: HashMap<String, LogLevel>,
    file: Option<File>,
    subscribers: Vec<LogCallback>,
}

/// Host logging system shared with modules.
pub struct LoggingSystem {
    state: Mutex<LoggingState>,
}

impl fmt::Debug for LoggingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoggingSystem")
            .field("levels", &state.levels)
            .field("file_logging", &state.file.is_some())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl LoggingSystem {
    /// Creates a logging system with the default category at `Info`.
    pub fn new() -> Self {
        let mut levels = HashMap::new();
        levels.insert(DEFAULT_CATEGORY.to_string(), LogLevel::Info);
        Self {
            state: Mutex::new(LoggingState {
                levels,
                file: None,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Logs an entry if its level passes the category's threshold.
    pub fn log(&self, entry: LogEntry) {
        let subscribers = {
            let mut state = self.state.lock();
            let threshold = Self::threshold(&state.levels, &entry.category);
            if threshold == LogLevel::None || entry.level < threshold {
                return;
            }

            emit_tracing(&entry);

            if let Some(file) = state.file.as_mut() {
                if let Err(e) = writeln!(file, "{}", entry.format_line()) {
                    tracing::warn!(error = %e, "Failed to write log file entry");
                }
            }

            state.subscribers.clone()
        };

        for callback in &subscribers {
            if !guarded(|| callback(&entry)) {
                tracing::error!(category = %entry.category, "Log subscriber panicked");
            }
        }
    }

    /// Logs a debug message.
    pub fn debug(&self, category: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Debug, category, message));
    }

    /// Logs an informational message.
    pub fn info(&self, category: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, category, message));
    }

    /// Logs a warning.
    pub fn warning(&self, category: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warning, category, message));
    }

    /// Logs an error.
    pub fn error(&self, category: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Error, category, message));
    }

    /// Sets the threshold for a category. Setting [`DEFAULT_CATEGORY`]
    /// changes the fallback for every category without its own level.
    pub fn set_log_level(&self, category: &str, level: LogLevel) {
        if category.is_empty() {
            return;
        }
        self.state.lock().levels.insert(category.to_string(), level);
    }

    /// Returns the effective threshold for a category.
    pub fn log_level(&self, category: &str) -> LogLevel {
        let state = self.state.lock();
        Self::threshold(&state.levels, category)
    }

    /// Subscribes to accepted log entries.
    pub fn subscribe(&self, callback: impl Fn(&LogEntry) + Send + Sync + 'static) {
        self.state.lock().subscribers.push(Arc::new(callback));
    }

    /// Mirrors accepted entries to `path`, appending to an existing file.
    pub fn enable_file_logging(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                AppError::with_source(
                    wave_core::ErrorKind::Io,
                    format!("Failed to open log file '{}'", path.display()),
                    e,
                )
            })?;
        self.state.lock().file = Some(file);
        Ok(())
    }

    /// Stops mirroring entries to the log file.
    pub fn disable_file_logging(&self) {
        self.state.lock().file = None;
    }

    fn threshold(levels: &HashMap<String, LogLevel>, category: &str) -> LogLevel {
        levels
            .get(category)
            .or_else(|| levels.get(DEFAULT_CATEGORY))
            .copied()
            .unwrap_or(LogLevel::Info)
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_tracing(entry: &LogEntry) {
    let category = entry.category.as_str();
    let message = entry.message.as_str();
    match entry.level {
        LogLevel::Debug => tracing::debug!(category, data = ?entry.data, "{message}"),
        LogLevel::Info => tracing::info!(category, data = ?entry.data, "{message}"),
        LogLevel::Warning => tracing::warn!(category, data = ?entry.data, "{message}"),
        LogLevel::Error => tracing::error!(category, data = ?entry.data, "{message}"),
        LogLevel::None => {}
    }
}
