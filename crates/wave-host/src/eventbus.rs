//! Publish/subscribe event bus.
//!
//! Payloads are `serde_json::Value`. A callback runs on the bus's delivery
//! thread only when both the publisher and the subscription asked for
//! [`DeliveryMode::Async`]; otherwise it runs on the publisher's thread.
//! Async deliveries are queued on one channel and run in publish order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::guarded;

/// Identifier returned by [`EventBus::subscribe`].
pub type SubscriptionId = u64;

/// How an event is delivered to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// On the publisher's thread, before `publish` returns.
    #[default]
    Sync,
    /// On the bus's delivery thread, after `publish` returns.
    Async,
}

type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

type Delivery = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    callback: EventCallback,
    mode: DeliveryMode,
}

/// Host event bus shared with modules.
pub struct EventBus {
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
    /// Feeds the delivery thread, spawned on the first async delivery.
    /// Dropping the bus closes the channel and the thread drains and exits.
    worker: Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subs = self.subscriptions.read();
        f.debug_struct("EventBus")
            .field("events", &subs.len())
            .field(
                "subscriptions",
                &subs.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            worker: Mutex::new(None),
        }
    }

    /// Subscribes to `event`.
    pub fn subscribe(
        &self,
        event: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
        mode: DeliveryMode,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                id,
                callback: Arc::new(callback),
                mode,
            });
        tracing::debug!(event, subscription_id = id, ?mode, "Event subscription added");
        id
    }

    /// Removes a subscription. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let mut removed = false;
        subs.retain(|_, list| {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Publishes `payload` to every subscriber of `event`.
    pub fn publish(&self, event: &str, payload: Value, mode: DeliveryMode) {
        let targets = match self.subscriptions.read().get(event) {
            Some(list) => list.clone(),
            None => return,
        };

        let payload = Arc::new(payload);
        for sub in targets {
            if mode == DeliveryMode::Async && sub.mode == DeliveryMode::Async {
                let payload = payload.clone();
                let event = event.to_string();
                self.enqueue(Box::new(move || {
                    if !guarded(|| (sub.callback)(&*payload)) {
                        tracing::error!(event = %event, subscription_id = sub.id, "Event subscriber panicked");
                    }
                }));
            } else if !guarded(|| (sub.callback)(&*payload)) {
                tracing::error!(event, subscription_id = sub.id, "Event subscriber panicked");
            }
        }
    }

    /// Hands a delivery to the worker, starting it if needed. Runs the
    /// delivery inline if no worker can be started.
    fn enqueue(&self, delivery: Delivery) {
        let mut worker = self.worker.lock();
        let delivery = match worker.as_ref() {
            Some(sender) => match sender.send(delivery) {
                Ok(()) => return,
                Err(mpsc::error::SendError(delivery)) => delivery,
            },
            None => delivery,
        };

        let (sender, mut receiver) = mpsc::unbounded_channel::<Delivery>();
        let spawned = std::thread::Builder::new()
            .name("wave-event-delivery".into())
            .spawn(move || {
                while let Some(delivery) = receiver.blocking_recv() {
                    delivery();
                }
                tracing::debug!("Event delivery worker stopped");
            });

        match spawned {
            Ok(_) => {
                tracing::debug!("Event delivery worker started");
                let rejected = sender.send(delivery).err();
                *worker = Some(sender);
                drop(worker);
                if let Some(mpsc::error::SendError(delivery)) = rejected {
                    delivery();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start event delivery worker, delivering inline");
                drop(worker);
                delivery();
            }
        }
    }

    /// Number of subscriptions for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscriptions.read().get(event).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
