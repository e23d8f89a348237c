//! Errors raised by persistence operations.

use crate::machine::ReplayError;
use crate::runtime::SpawnError;
use thiserror::Error;

/// A value could not be encoded or decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary codec error: {0}")]
    Bincode(#[from] bincode::Error),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Version conflict for '{id}': stored version {stored}, attempted {attempted}")]
    VersionConflict {
        id: String,
        stored: u64,
        attempted: u64,
    },

    #[error("Replay failed for '{id}': {source}")]
    Replay {
        id: String,
        #[source]
        source: ReplayError,
    },

    #[error("Cannot spawn restored actor: {0}")]
    Spawn(#[from] SpawnError),

    #[error("Actor '{0}' already has persisted data; restore it instead")]
    AlreadyPersisted(String),

    #[error("restore_all requires PersistenceConfig::machine_type to be set")]
    MissingMachineType,
}

impl PersistenceError {
    pub fn storage(message: impl std::fmt::Display) -> Self {
        PersistenceError::Storage(message.to_string())
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, PersistenceError::VersionConflict { .. })
    }
}
