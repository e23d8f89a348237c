//! Commit hook writing journal, snapshots and metadata.

use crate::core::{Event, State};
use crate::persistence::config::{Persistence, SnapshotSchedule};
use crate::persistence::types::{ActorMetadata, StoredEvent, StoredSnapshot};
use crate::runtime::{Commit, CommitHook};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};

pub(crate) struct PersistenceHook {
    persistence: Persistence,
    version: AtomicU64,
    pending: AtomicU64,
    created_at: DateTime<Utc>,
}

impl PersistenceHook {
    pub(crate) fn new(persistence: Persistence, version: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            persistence,
            version: AtomicU64::new(version),
            pending: AtomicU64::new(0),
            created_at,
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    async fn append<E: Event>(&self, actor_id: &str, event: &E, version: u64, at: DateTime<Utc>) {
        let data = match self.persistence.config().codec.encode(event) {
            Ok(data) => data,
            Err(e) => {
                warn!(actor_id, version, error = %e, "cannot encode event; journal entry skipped");
                return;
            }
        };
        let entry = StoredEvent {
            data,
            version,
            timestamp: at,
        };
        if let Err(e) = self.persistence.adapter().append_event(actor_id, entry).await {
            warn!(actor_id, version, error = %e, "journal append failed");
        }
    }

    async fn snapshot<S: State>(&self, actor_id: &str, state: &S, version: u64, at: DateTime<Utc>) {
        let data = match self.persistence.config().codec.encode(state) {
            Ok(data) => data,
            Err(e) => {
                error!(actor_id, version, error = %e, "cannot encode state; snapshot skipped");
                return;
            }
        };
        let snapshot = StoredSnapshot {
            data,
            version,
            timestamp: at,
        };
        match self.persistence.adapter().save_snapshot(actor_id, snapshot).await {
            Ok(()) => self.pending.store(0, Ordering::SeqCst),
            Err(e) => error!(actor_id, version, error = %e, "snapshot write failed"),
        }
    }

    async fn record_metadata<S: State>(&self, actor_id: &str, state: &S, at: DateTime<Utc>) {
        let metadata = ActorMetadata {
            id: actor_id.to_string(),
            machine_type: self.persistence.config().machine_type.clone(),
            created_at: self.created_at,
            last_activity_at: at,
            version: self.version(),
            state_tag: state.name().to_string(),
        };
        if let Err(e) = self.persistence.adapter().save_metadata(metadata).await {
            debug!(actor_id, error = %e, "metadata write failed");
        }
    }
}

#[async_trait]
impl<S: State, E: Event> CommitHook<S, E> for PersistenceHook {
    async fn on_start(&self, actor_id: &str, state: &S) {
        self.record_metadata(actor_id, state, Utc::now()).await;
    }

    async fn on_commit(&self, commit: &Commit<'_, S, E>) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();

        if self.persistence.config().journal {
            self.append(commit.actor_id, commit.event, version, now).await;
        }

        let pending = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if self.persistence.config().snapshot.is_due(pending) {
            self.snapshot(commit.actor_id, commit.state, version, now).await;
        }

        self.record_metadata(commit.actor_id, commit.state, now).await;
    }

    async fn on_stop(&self, actor_id: &str, state: &S) {
        let pending = self.pending.load(Ordering::SeqCst);
        if pending > 0 && self.persistence.config().snapshot != SnapshotSchedule::Never {
            self.snapshot(actor_id, state, self.version(), Utc::now()).await;
        }
    }
}
