//! Storage contract for persistent actors.

use crate::persistence::error::PersistenceError;
use crate::persistence::types::{ActorMetadata, StoredEvent, StoredSnapshot};
use async_trait::async_trait;

/// Where snapshots, journals and registry metadata live.
///
/// Implementations must apply optimistic locking in `save_snapshot`: a
/// snapshot older than the stored one is rejected with
/// [`PersistenceError::VersionConflict`], while a snapshot with the same
/// version is accepted so retries are safe.
///
/// The registry methods are optional. Their defaults report an empty
/// registry and ignore writes, so an adapter without a registry still
/// supports every per-actor operation.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn save_snapshot(&self, id: &str, snapshot: StoredSnapshot)
        -> Result<(), PersistenceError>;

    async fn load_snapshot(&self, id: &str) -> Result<Option<StoredSnapshot>, PersistenceError>;

    async fn append_event(&self, id: &str, event: StoredEvent) -> Result<(), PersistenceError>;

    /// Journal entries in version order, restricted to versions strictly
    /// greater than `after_version` when given.
    async fn load_events(
        &self,
        id: &str,
        after_version: Option<u64>,
    ) -> Result<Vec<StoredEvent>, PersistenceError>;

    /// Remove the snapshot and journal of `id`.
    async fn delete_actor(&self, id: &str) -> Result<(), PersistenceError>;

    async fn list_actors(
        &self,
        _machine_type: Option<&str>,
    ) -> Result<Vec<ActorMetadata>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn save_metadata(&self, _metadata: ActorMetadata) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn load_metadata(&self, _id: &str) -> Result<Option<ActorMetadata>, PersistenceError> {
        Ok(None)
    }

    async fn delete_metadata(&self, _id: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
}
