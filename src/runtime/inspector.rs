//! Runtime inspection.
//!
//! An inspector observes what actors do without taking part in it. A
//! panicking inspector is contained at the call site.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// A notification delivered to an [`Inspector`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inspection {
    Spawned {
        actor_id: String,
        parent: Option<String>,
        state: String,
    },
    EventReceived {
        actor_id: String,
        event: String,
    },
    Transition {
        actor_id: String,
        from: String,
        to: String,
    },
    Effect {
        actor_id: String,
        slot: String,
        trigger: String,
        error: Option<String>,
    },
    Stopped {
        actor_id: String,
        state: String,
    },
}

impl Inspection {
    pub fn actor_id(&self) -> &str {
        match self {
            Inspection::Spawned { actor_id, .. }
            | Inspection::EventReceived { actor_id, .. }
            | Inspection::Transition { actor_id, .. }
            | Inspection::Effect { actor_id, .. }
            | Inspection::Stopped { actor_id, .. } => actor_id,
        }
    }
}

pub trait Inspector: Send + Sync {
    fn inspect(&self, inspection: &Inspection);
}

pub(crate) fn notify(inspector: Option<&Arc<dyn Inspector>>, inspection: impl FnOnce() -> Inspection) {
    let Some(inspector) = inspector else {
        return;
    };
    let inspection = inspection();
    let delivered =
        std::panic::catch_unwind(AssertUnwindSafe(|| inspector.inspect(&inspection)));
    if delivered.is_err() {
        warn!(actor_id = %inspection.actor_id(), "inspector panicked; notification dropped");
    }
}

/// Forwards every notification to `tracing` at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingInspector;

impl Inspector for TracingInspector {
    fn inspect(&self, inspection: &Inspection) {
        match inspection {
            Inspection::Spawned {
                actor_id,
                parent,
                state,
            } => debug!(actor_id = %actor_id, parent = ?parent, state = %state, "actor spawned"),
            Inspection::EventReceived { actor_id, event } => {
                debug!(actor_id = %actor_id, event = %event, "event received")
            }
            Inspection::Transition { actor_id, from, to } => {
                debug!(actor_id = %actor_id, from = %from, to = %to, "transition")
            }
            Inspection::Effect {
                actor_id,
                slot,
                trigger,
                error,
            } => debug!(actor_id = %actor_id, slot = %slot, trigger = %trigger, error = ?error, "effect"),
            Inspection::Stopped { actor_id, state } => {
                debug!(actor_id = %actor_id, state = %state, "actor stopped")
            }
        }
    }
}

/// Keeps every notification in memory, mostly for tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingInspector {
    records: Arc<Mutex<Vec<Inspection>>>,
}

impl RecordingInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Inspection> {
        self.records.lock().clone()
    }

    pub fn records_for(&self, actor_id: &str) -> Vec<Inspection> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.actor_id() == actor_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Inspector for RecordingInspector {
    fn inspect(&self, inspection: &Inspection) {
        self.records.lock().push(inspection.clone());
    }
}
