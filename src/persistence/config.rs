//! Persistence configuration.

use crate::persistence::adapter::PersistenceAdapter;
use crate::persistence::codec::Codec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// When a persistent actor writes a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotSchedule {
    #[default]
    EveryCommit,
    /// After every `n` commits, and on stop if commits are pending.
    Every(u64),
    /// Never; state is rebuilt from the journal alone.
    Never,
}

impl SnapshotSchedule {
    pub fn is_due(&self, pending_commits: u64) -> bool {
        match self {
            SnapshotSchedule::EveryCommit => pending_commits > 0,
            SnapshotSchedule::Every(n) => pending_commits >= (*n).max(1),
            SnapshotSchedule::Never => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Append every committed event to the journal.
    pub journal: bool,
    pub snapshot: SnapshotSchedule,
    /// Recorded in metadata; required by `restore_all`.
    pub machine_type: Option<String>,
    pub codec: Codec,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            journal: true,
            snapshot: SnapshotSchedule::EveryCommit,
            machine_type: None,
            codec: Codec::Json,
        }
    }
}

impl PersistenceConfig {
    pub fn with_machine_type(mut self, machine_type: impl Into<String>) -> Self {
        self.machine_type = Some(machine_type.into());
        self
    }

    pub fn with_snapshot(mut self, schedule: SnapshotSchedule) -> Self {
        self.snapshot = schedule;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn without_journal(mut self) -> Self {
        self.journal = false;
        self
    }
}

/// An adapter paired with the configuration used to write through it.
#[derive(Clone)]
pub struct Persistence {
    adapter: Arc<dyn PersistenceAdapter>,
    config: PersistenceConfig,
}

impl Persistence {
    pub fn new(adapter: impl PersistenceAdapter + 'static) -> Self {
        Self::from_arc(Arc::new(adapter))
    }

    pub fn from_arc(adapter: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            adapter,
            config: PersistenceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PersistenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn adapter(&self) -> &dyn PersistenceAdapter {
        self.adapter.as_ref()
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedules() {
        assert!(SnapshotSchedule::EveryCommit.is_due(1));
        assert!(!SnapshotSchedule::EveryCommit.is_due(0));
        assert!(!SnapshotSchedule::Every(3).is_due(2));
        assert!(SnapshotSchedule::Every(3).is_due(3));
        assert!(SnapshotSchedule::Every(0).is_due(1));
        assert!(!SnapshotSchedule::Never.is_due(100));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: PersistenceConfig =
            serde_json::from_str(r#"{"machine_type": "order", "codec": "Bincode"}"#).unwrap();
        assert!(config.journal);
        assert_eq!(config.snapshot, SnapshotSchedule::EveryCommit);
        assert_eq!(config.machine_type.as_deref(), Some("order"));
        assert_eq!(config.codec, Codec::Bincode);
    }
}
