//! Broadcast of actor lifecycle notifications.

use crate::machine::panic_message;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemEvent {
    Spawned {
        actor_id: String,
        parent: Option<String>,
    },
    Stopped {
        actor_id: String,
    },
}

impl SystemEvent {
    pub fn actor_id(&self) -> &str {
        match self {
            SystemEvent::Spawned { actor_id, .. } | SystemEvent::Stopped { actor_id } => actor_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

type Subscriber = Arc<dyn Fn(&SystemEvent) + Send + Sync>;

/// Fan-out of [`SystemEvent`]s to external subscribers.
///
/// A subscriber that panics is logged and skipped; the remaining
/// subscribers still receive the event.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriberId, Subscriber)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, subscriber: F) -> SubscriberId
    where
        F: Fn(&SystemEvent) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Deliver `event` to every subscriber; returns how many accepted it.
    pub fn publish(&self, event: &SystemEvent) -> usize {
        // Call outside the lock so subscribers may (un)subscribe.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        let mut delivered = 0;
        for subscriber in subscribers {
            match std::panic::catch_unwind(AssertUnwindSafe(|| subscriber(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => warn!(
                    actor_id = %event.actor_id(),
                    panic = %panic_message(payload),
                    "event bus subscriber panicked"
                ),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}
