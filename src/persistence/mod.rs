//! Persistence for actors: snapshots, an event journal and replay.
//!
//! A persistent actor is an ordinary actor with a commit hook. Every
//! processed event that commits bumps the actor's version by one, appends
//! a journal entry carrying that version and, per the snapshot schedule,
//! writes a snapshot with the same version. Restoring loads the latest
//! snapshot and replays the journal entries after it.

mod adapter;
mod codec;
mod config;
mod error;
mod hook;
mod memory;
mod restore;
mod types;

pub use adapter::PersistenceAdapter;
pub use codec::Codec;
pub use config::{Persistence, PersistenceConfig, SnapshotSchedule};
pub use error::{CodecError, PersistenceError};
pub use memory::InMemoryAdapter;
pub use restore::{PersistentActorRef, RestoreReport};
pub use types::{ActorMetadata, JournalEntry, Snapshot, StoredEvent, StoredSnapshot};
