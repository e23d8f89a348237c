//! Persisted records.

use crate::persistence::codec::Codec;
use crate::persistence::error::CodecError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// State of an actor as of `version`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub state: S,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

/// An event that produced the commit numbered `version`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry<E> {
    pub event: E,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

/// Registry record describing one persisted actor.
///
/// Rewritten after every commit on a best-effort basis; it may lag the
/// snapshot but is never ahead of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorMetadata {
    pub id: String,
    pub machine_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub version: u64,
    pub state_tag: String,
}

/// A snapshot as stored by an adapter: the state is already encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub data: Vec<u8>,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

/// A journal entry as stored by an adapter: the event is already encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub data: Vec<u8>,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

impl<S: Serialize> Snapshot<S> {
    pub fn encode(&self, codec: Codec) -> Result<StoredSnapshot, CodecError> {
        Ok(StoredSnapshot {
            data: codec.encode(&self.state)?,
            version: self.version,
            timestamp: self.timestamp,
        })
    }
}

impl StoredSnapshot {
    pub fn decode<S: DeserializeOwned>(&self, codec: Codec) -> Result<Snapshot<S>, CodecError> {
        Ok(Snapshot {
            state: codec.decode(&self.data)?,
            version: self.version,
            timestamp: self.timestamp,
        })
    }
}

impl<E: Serialize> JournalEntry<E> {
    pub fn encode(&self, codec: Codec) -> Result<StoredEvent, CodecError> {
        Ok(StoredEvent {
            data: codec.encode(&self.event)?,
            version: self.version,
            timestamp: self.timestamp,
        })
    }
}

impl StoredEvent {
    pub fn decode<E: DeserializeOwned>(&self, codec: Codec) -> Result<JournalEntry<E>, CodecError> {
        Ok(JournalEntry {
            event: codec.decode(&self.data)?,
            version: self.version,
            timestamp: self.timestamp,
        })
    }
}
