//! In-memory reference adapter.

use crate::persistence::adapter::PersistenceAdapter;
use crate::persistence::error::PersistenceError;
use crate::persistence::types::{ActorMetadata, StoredEvent, StoredSnapshot};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Adapter keeping everything in process memory.
///
/// Clones share the same store, so a test can keep one clone to inspect
/// what an actor system wrote through another.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAdapter {
    store: Arc<RwLock<Store>>,
}

#[derive(Debug, Default)]
struct Store {
    snapshots: HashMap<String, StoredSnapshot>,
    journals: HashMap<String, Vec<StoredEvent>>,
    metadata: HashMap<String, ActorMetadata>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot_version(&self, id: &str) -> Option<u64> {
        self.store.read().snapshots.get(id).map(|s| s.version)
    }

    pub fn journal_len(&self, id: &str) -> usize {
        self.store.read().journals.get(id).map_or(0, Vec::len)
    }

    pub fn has_actor(&self, id: &str) -> bool {
        let store = self.store.read();
        store.snapshots.contains_key(id) || store.journals.contains_key(id)
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryAdapter {
    async fn save_snapshot(
        &self,
        id: &str,
        snapshot: StoredSnapshot,
    ) -> Result<(), PersistenceError> {
        let mut store = self.store.write();
        if let Some(stored) = store.snapshots.get(id) {
            if snapshot.version < stored.version {
                return Err(PersistenceError::VersionConflict {
                    id: id.to_string(),
                    stored: stored.version,
                    attempted: snapshot.version,
                });
            }
        }
        store.snapshots.insert(id.to_string(), snapshot);
        Ok(())
    }

    async fn load_snapshot(&self, id: &str) -> Result<Option<StoredSnapshot>, PersistenceError> {
        Ok(self.store.read().snapshots.get(id).cloned())
    }

    async fn append_event(&self, id: &str, event: StoredEvent) -> Result<(), PersistenceError> {
        let mut store = self.store.write();
        let journal = store.journals.entry(id.to_string()).or_default();
        match journal.last() {
            Some(last) if event.version == last.version => Ok(()),
            Some(last) if event.version < last.version => Err(PersistenceError::VersionConflict {
                id: id.to_string(),
                stored: last.version,
                attempted: event.version,
            }),
            _ => {
                journal.push(event);
                Ok(())
            }
        }
    }

    async fn load_events(
        &self,
        id: &str,
        after_version: Option<u64>,
    ) -> Result<Vec<StoredEvent>, PersistenceError> {
        let store = self.store.read();
        let Some(journal) = store.journals.get(id) else {
            return Ok(Vec::new());
        };
        Ok(journal
            .iter()
            .filter(|e| after_version.map_or(true, |after| e.version > after))
            .cloned()
            .collect())
    }

    async fn delete_actor(&self, id: &str) -> Result<(), PersistenceError> {
        let mut store = self.store.write();
        store.snapshots.remove(id);
        store.journals.remove(id);
        Ok(())
    }

    async fn list_actors(
        &self,
        machine_type: Option<&str>,
    ) -> Result<Vec<ActorMetadata>, PersistenceError> {
        let mut actors: Vec<ActorMetadata> = self
            .store
            .read()
            .metadata
            .values()
            .filter(|m| machine_type.map_or(true, |t| m.machine_type.as_deref() == Some(t)))
            .cloned()
            .collect();
        actors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(actors)
    }

    async fn save_metadata(&self, metadata: ActorMetadata) -> Result<(), PersistenceError> {
        self.store
            .write()
            .metadata
            .insert(metadata.id.clone(), metadata);
        Ok(())
    }

    async fn load_metadata(&self, id: &str) -> Result<Option<ActorMetadata>, PersistenceError> {
        Ok(self.store.read().metadata.get(id).cloned())
    }

    async fn delete_metadata(&self, id: &str) -> Result<(), PersistenceError> {
        self.store.write().metadata.remove(id);
        Ok(())
    }
}
