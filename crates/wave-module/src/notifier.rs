//! Lifecycle event notifier.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::record::{ModuleEventKind, ModuleRecord};
use crate::safety::panic_message;

/// Identifier returned when subscribing to lifecycle events.
pub type SubscriptionId = u64;

/// Callback receiving lifecycle events.
pub type ModuleEventCallback = Arc<dyn Fn(ModuleEventKind, &ModuleRecord, &str) + Send + Sync>;

/// Ordered, append-only list of lifecycle subscribers.
///
/// Dispatch is synchronous. A panicking subscriber is logged and skipped;
/// the remaining subscribers still run.
pub struct EventNotifier {
    subscribers: Mutex<Vec<(SubscriptionId, ModuleEventCallback)>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl EventNotifier {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends a subscriber.
    pub fn subscribe(
        &self,
        callback: impl Fn(ModuleEventKind, &ModuleRecord, &str) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Returns `true` if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers an event to every subscriber in registration order.
    pub fn notify(&self, kind: ModuleEventKind, record: &ModuleRecord, message: &str) {
        if kind.is_error() {
            tracing::warn!(
                event = %kind,
                module = %record.name,
                path = %record.path.display(),
                "{message}"
            );
        } else {
            tracing::info!(
                event = %kind,
                module = %record.name,
                version = %record.version,
                path = %record.path.display(),
                "{message}"
            );
        }

        let subscribers = self.subscribers.lock().clone();
        for (id, callback) in &subscribers {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(kind, record, message)
            }));
            if let Err(payload) = outcome {
                tracing::error!(
                    subscription_id = id,
                    event = %kind,
                    panic = %panic_message(payload.as_ref()),
                    "Module event subscriber panicked"
                );
            }
        }
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new()
    }
}
