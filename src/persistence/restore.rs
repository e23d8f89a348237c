//! Persistent actors: spawning, restoring and deleting.

use crate::core::{Event, State};
use crate::machine::{IntoMachine, Machine};
use crate::persistence::config::Persistence;
use crate::persistence::error::PersistenceError;
use crate::persistence::hook::PersistenceHook;
use crate::runtime::{ActorRef, Launch, SpawnError};
use crate::system::ActorSystem;
use chrono::Utc;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

/// An actor whose commits are journaled and snapshotted.
///
/// Dereferences to the underlying [`ActorRef`].
pub struct PersistentActorRef<S, E> {
    actor: ActorRef<S, E>,
    hook: Arc<PersistenceHook>,
}

impl<S: State, E: Event> PersistentActorRef<S, E> {
    /// Version of the last commit; 0 before the first one.
    ///
    /// Every processed event that commits bumps it by exactly one, whether or
    /// not its state tag changed. The always-cascade the event triggers is
    /// part of the same commit.
    pub fn version(&self) -> u64 {
        self.hook.version()
    }

    pub fn actor(&self) -> &ActorRef<S, E> {
        &self.actor
    }

    pub fn into_actor(self) -> ActorRef<S, E> {
        self.actor
    }
}

impl<S, E> Deref for PersistentActorRef<S, E> {
    type Target = ActorRef<S, E>;

    fn deref(&self) -> &ActorRef<S, E> {
        &self.actor
    }
}

impl<S, E> Clone for PersistentActorRef<S, E> {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            hook: Arc::clone(&self.hook),
        }
    }
}

impl<S: State, E: Event> std::fmt::Debug for PersistentActorRef<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentActorRef")
            .field("actor", &self.actor)
            .field("version", &self.version())
            .finish()
    }
}

/// Outcome of a bulk restore: one bad id never fails the batch.
pub struct RestoreReport<S, E> {
    pub restored: Vec<PersistentActorRef<S, E>>,
    pub failed: Vec<(String, PersistenceError)>,
}

impl<S, E> Default for RestoreReport<S, E> {
    fn default() -> Self {
        Self {
            restored: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<S: State, E: Event> std::fmt::Debug for RestoreReport<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreReport")
            .field("restored", &self.restored)
            .field("failed", &self.failed)
            .finish()
    }
}

impl<S: State, E: Event> RestoreReport<S, E> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn restored_ids(&self) -> Vec<&str> {
        self.restored.iter().map(|a| a.id()).collect()
    }
}

struct Recovered<S> {
    state: S,
    version: u64,
}

impl ActorSystem {
    /// Spawn a new persistent actor at version 0.
    ///
    /// Fails if the adapter already holds a snapshot or journal for `id`;
    /// use [`ActorSystem::restore`] to resume such an actor.
    pub async fn spawn_persistent<S, E>(
        &self,
        id: impl Into<String>,
        machine: impl IntoMachine<S, E>,
        persistence: &Persistence,
    ) -> Result<PersistentActorRef<S, E>, PersistenceError>
    where
        S: State,
        E: Event,
    {
        let id = id.into();
        let machine = machine.into_machine().map_err(SpawnError::from)?;
        let adapter = persistence.adapter();
        if adapter.load_snapshot(&id).await?.is_some()
            || !adapter.load_events(&id, None).await?.is_empty()
        {
            return Err(PersistenceError::AlreadyPersisted(id));
        }
        self.launch_persistent(id, machine, persistence, None).await
    }

    /// Rebuild an actor from its latest snapshot and the journal after it,
    /// then spawn it.
    ///
    /// With nothing stored the actor starts fresh at version 0. Journal
    /// entries are replayed through synchronous handlers only; an entry
    /// that would need a suspending handler fails the restore.
    pub async fn restore<S, E>(
        &self,
        id: impl Into<String>,
        machine: impl IntoMachine<S, E>,
        persistence: &Persistence,
    ) -> Result<PersistentActorRef<S, E>, PersistenceError>
    where
        S: State,
        E: Event,
    {
        let machine = machine.into_machine().map_err(SpawnError::from)?;
        self.restore_one(id.into(), &machine, persistence).await
    }

    /// Restore each id independently.
    pub async fn restore_many<S, E, I>(
        &self,
        ids: I,
        machine: &Machine<S, E>,
        persistence: &Persistence,
    ) -> RestoreReport<S, E>
    where
        S: State,
        E: Event,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut report = RestoreReport::default();
        for id in ids {
            let id = id.into();
            match self.restore_one(id.clone(), machine, persistence).await {
                Ok(actor) => report.restored.push(actor),
                Err(e) => {
                    warn!(actor_id = %id, error = %e, "restore failed");
                    report.failed.push((id, e));
                }
            }
        }
        report
    }

    /// Restore every actor the adapter's registry lists for the configured
    /// machine type.
    ///
    /// Requires `PersistenceConfig::machine_type`. Adapters without a
    /// registry list nothing, so the report is empty.
    pub async fn restore_all<S, E>(
        &self,
        machine: &Machine<S, E>,
        persistence: &Persistence,
    ) -> Result<RestoreReport<S, E>, PersistenceError>
    where
        S: State,
        E: Event,
    {
        let machine_type = persistence
            .config()
            .machine_type
            .as_deref()
            .ok_or(PersistenceError::MissingMachineType)?;
        let listed = persistence.adapter().list_actors(Some(machine_type)).await?;
        let ids: Vec<String> = listed
            .into_iter()
            .map(|m| m.id)
            .filter(|id| !self.contains(id))
            .collect();
        Ok(self.restore_many(ids, machine, persistence).await)
    }

    /// Stop the actor if it is running, then remove everything persisted
    /// for it.
    pub async fn delete(&self, id: &str, persistence: &Persistence) -> Result<(), PersistenceError> {
        self.stop(id).await;
        let adapter = persistence.adapter();
        adapter.delete_actor(id).await?;
        adapter.delete_metadata(id).await?;
        debug!(actor_id = %id, "persisted actor deleted");
        Ok(())
    }

    async fn restore_one<S: State, E: Event>(
        &self,
        id: String,
        machine: &Machine<S, E>,
        persistence: &Persistence,
    ) -> Result<PersistentActorRef<S, E>, PersistenceError> {
        if self.contains(&id) {
            return Err(SpawnError::DuplicateId(id).into());
        }
        let recovered = self.recover(&id, machine, persistence).await?;
        debug!(actor_id = %id, version = recovered.version, "actor recovered");
        self.launch_persistent(id, machine.clone(), persistence, Some(recovered))
            .await
    }

    async fn recover<S: State, E: Event>(
        &self,
        id: &str,
        machine: &Machine<S, E>,
        persistence: &Persistence,
    ) -> Result<Recovered<S>, PersistenceError> {
        let codec = persistence.config().codec;
        let adapter = persistence.adapter();
        let max_iterations = self.config().max_always_iterations;

        let (state, mut version) = match adapter.load_snapshot(id).await? {
            Some(stored) => (stored.decode::<S>(codec)?.state, stored.version),
            None => (machine.initial_state().clone(), 0),
        };
        // a fresh actor settles its initial state before the first event
        let mut state = machine.settle(state, max_iterations).await.state;

        for stored in adapter.load_events(id, Some(version)).await? {
            if stored.version <= version {
                continue;
            }
            let entry = stored.decode::<E>(codec)?;
            state = machine
                .replay(state, &entry.event, max_iterations)
                .await
                .map_err(|source| PersistenceError::Replay {
                    id: id.to_string(),
                    source,
                })?;
            version = entry.version;
        }

        Ok(Recovered { state, version })
    }

    async fn launch_persistent<S: State, E: Event>(
        &self,
        id: String,
        machine: Machine<S, E>,
        persistence: &Persistence,
        recovered: Option<Recovered<S>>,
    ) -> Result<PersistentActorRef<S, E>, PersistenceError> {
        let created_at = match persistence.adapter().load_metadata(&id).await {
            Ok(Some(metadata)) => metadata.created_at,
            _ => Utc::now(),
        };
        let version = recovered.as_ref().map_or(0, |r| r.version);
        let hook = Arc::new(PersistenceHook::new(persistence.clone(), version, created_at));

        let mut launch = Launch::new(id, machine, self.context()).with_hook(hook.clone());
        if let Some(recovered) = recovered {
            launch = launch.with_initial(recovered.state);
        }
        let actor = launch.start(None).await?;
        Ok(PersistentActorRef { actor, hook })
    }
}
