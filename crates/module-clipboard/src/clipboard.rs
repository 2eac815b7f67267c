//! Clipboard service: backend access, history and change events.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

use wave_host::{DeliveryMode, EventBus};

use crate::backend::ClipboardBackend;

/// Outcome category of a clipboard operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardStatus {
    /// The operation completed.
    Success,
    /// The backend failed.
    Error,
    /// The operation is unavailable in the current configuration.
    NotSupported,
}

/// Result of a clipboard operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipboardResult {
    /// Outcome category.
    pub status: ClipboardStatus,
    /// Human-readable message.
    pub message: String,
    /// Pasted text, for `paste`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ClipboardResult {
    fn new(status: ClipboardStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: String) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns `true` on [`ClipboardStatus::Success`].
    pub fn is_success(&self) -> bool {
        self.status == ClipboardStatus::Success
    }
}

/// Clipboard change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardEventKind {
    /// Text was copied.
    Copied,
    /// Text was pasted.
    Pasted,
    /// History was cleared.
    HistoryCleared,
}

impl ClipboardEventKind {
    /// Event name published on the host bus.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Copied => "clipboard.copied",
            Self::Pasted => "clipboard.pasted",
            Self::HistoryCleared => "clipboard.history_cleared",
        }
    }
}

/// Callback receiving clipboard events with the text involved.
pub type ClipboardEventCallback = Arc<dyn Fn(ClipboardEventKind, &str) + Send + Sync>;

/// Clipboard with bounded history.
///
/// A history limit of zero disables history.
pub struct Clipboard {
    backend: Box<dyn ClipboardBackend>,
    history: Mutex<VecDeque<String>>,
    history_limit: usize,
    subscribers: Mutex<Vec<ClipboardEventCallback>>,
    event_bus: Option<Arc<EventBus>>,
}

impl fmt::Debug for Clipboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clipboard")
            .field("backend", &self.backend.name())
            .field("history_len", &self.history.lock().len())
            .field("history_limit", &self.history_limit)
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

impl Clipboard {
    /// Creates a clipboard over `backend`.
    pub fn new(backend: Box<dyn ClipboardBackend>, history_limit: usize) -> Self {
        Self {
            backend,
            history: Mutex::new(VecDeque::new()),
            history_limit,
            subscribers: Mutex::new(Vec::new()),
            event_bus: None,
        }
    }

    /// Also publishes events on the host bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Copies `text` and records it in history.
    pub fn copy(&self, text: &str) -> ClipboardResult {
        if let Err(e) = self.backend.copy(text) {
            tracing::warn!(backend = self.backend.name(), error = %e, "Clipboard copy failed");
            return ClipboardResult::new(ClipboardStatus::Error, e);
        }

        if self.history_limit > 0 {
            let mut history = self.history.lock();
            history.push_front(text.to_string());
            history.truncate(self.history_limit);
        }

        self.broadcast(ClipboardEventKind::Copied, text);
        ClipboardResult::new(ClipboardStatus::Success, "Text copied to clipboard.")
    }

    /// Reads the current clipboard text.
    pub fn paste(&self) -> ClipboardResult {
        match self.backend.paste() {
            Ok(text) => {
                self.broadcast(ClipboardEventKind::Pasted, &text);
                ClipboardResult::new(ClipboardStatus::Success, "Text pasted from clipboard.")
                    .with_data(text)
            }
            Err(e) => ClipboardResult::new(ClipboardStatus::Error, e),
        }
    }

    /// Copied texts, newest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().iter().cloned().collect()
    }

    /// Clears history. Reports `NotSupported` when history is disabled.
    pub fn clear_history(&self) -> ClipboardResult {
        if self.history_limit == 0 {
            return ClipboardResult::new(
                ClipboardStatus::NotSupported,
                "Clipboard history is disabled.",
            );
        }
        self.history.lock().clear();
        self.broadcast(ClipboardEventKind::HistoryCleared, "");
        ClipboardResult::new(ClipboardStatus::Success, "Clipboard history cleared.")
    }

    /// Registers a callback for clipboard events.
    pub fn subscribe(&self, callback: impl Fn(ClipboardEventKind, &str) + Send + Sync + 'static) {
        self.subscribers.lock().push(Arc::new(callback));
    }

    fn broadcast(&self, kind: ClipboardEventKind, text: &str) {
        let subscribers = self.subscribers.lock().clone();
        for callback in &subscribers {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(kind, text)
            }));
            if outcome.is_err() {
                tracing::error!(event = kind.topic(), "Clipboard event callback panicked");
            }
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(
                kind.topic(),
                json!({ "text": text, "backend": self.backend.name() }),
                DeliveryMode::Sync,
            );
        }
    }
}
