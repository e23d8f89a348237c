//! Actor system: a registry of running actors keyed by id.
//!
//! The registry is the only shared mutable structure in the runtime. It
//! owns one type-erased handle per live actor; actors hold only a weak
//! reference back to the system, used to deregister during teardown and to
//! register the children they spawn.

use crate::core::{Event, State};
use crate::machine::IntoMachine;
use crate::runtime::{
    ActorConfig, ActorRef, ErasedActor, Inspector, Launch, RuntimeContext, SpawnError,
};
use crate::system::bus::{EventBus, SubscriberId, SystemEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    id: String,
    config: ActorConfig,
    inspector: Option<Arc<dyn Inspector>>,
    registry: RwLock<HashMap<String, Arc<dyn ErasedActor>>>,
    bus: EventBus,
}

#[derive(Clone)]
pub(crate) struct WeakSystem(Weak<SystemInner>);

impl WeakSystem {
    pub(crate) fn upgrade(&self) -> Option<ActorSystem> {
        self.0.upgrade().map(|inner| ActorSystem { inner })
    }
}

/// Builder for [`ActorSystem`].
#[derive(Default)]
pub struct ActorSystemBuilder {
    config: ActorConfig,
    inspector: Option<Arc<dyn Inspector>>,
}

impl ActorSystemBuilder {
    pub fn config(mut self, config: ActorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn build(self) -> ActorSystem {
        let id = format!("system-{}", Uuid::new_v4().simple());
        debug!(system_id = %id, "actor system created");
        ActorSystem {
            inner: Arc::new(SystemInner {
                id,
                config: self.config,
                inspector: self.inspector,
                registry: RwLock::new(HashMap::new()),
                bus: EventBus::new(),
            }),
        }
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> &ActorConfig {
        &self.inner.config
    }

    pub(crate) fn context(&self) -> RuntimeContext {
        RuntimeContext {
            config: self.inner.config.clone(),
            inspector: self.inner.inspector.clone(),
            system: Some(WeakSystem(Arc::downgrade(&self.inner))),
        }
    }

    /// Spawn and register an actor.
    ///
    /// Fails without starting anything if `id` is already registered or the
    /// machine has unprovided slots. Returns once startup has finished.
    pub async fn spawn<S, E>(
        &self,
        id: impl Into<String>,
        machine: impl IntoMachine<S, E>,
    ) -> Result<ActorRef<S, E>, SpawnError>
    where
        S: State,
        E: Event,
    {
        let id = id.into();
        if self.contains(&id) {
            return Err(SpawnError::DuplicateId(id));
        }
        Launch::new(id, machine.into_machine()?, self.context())
            .start(None)
            .await
    }

    /// Typed handle to a registered actor.
    ///
    /// Returns `None` if no actor has this id or its state and event types
    /// are not `S` and `E`.
    pub fn get<S: State, E: Event>(&self, id: &str) -> Option<ActorRef<S, E>> {
        self.inner
            .registry
            .read()
            .get(id)?
            .as_any()
            .downcast_ref::<ActorRef<S, E>>()
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.registry.read().contains_key(id)
    }

    /// Ids of every registered actor, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.registry.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Current state tag of a registered actor, whatever its types.
    pub fn state_tag(&self, id: &str) -> Option<String> {
        self.inner.registry.read().get(id).map(|a| a.state_tag())
    }

    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.read().is_empty()
    }

    /// Stop an actor and wait for its teardown. Returns `false` if no
    /// actor with this id is registered.
    pub async fn stop(&self, id: &str) -> bool {
        let actor = self.inner.registry.read().get(id).cloned();
        match actor {
            Some(actor) => {
                actor.stop_boxed().await;
                true
            }
            None => false,
        }
    }

    /// Stop every registered actor concurrently.
    pub async fn shutdown(&self) {
        let actors: Vec<Arc<dyn ErasedActor>> =
            self.inner.registry.read().values().cloned().collect();
        debug!(system_id = %self.inner.id, actors = actors.len(), "shutting down");
        futures::future::join_all(actors.iter().map(|actor| actor.stop_boxed())).await;
    }

    pub fn subscribe<F>(&self, subscriber: F) -> SubscriberId
    where
        F: Fn(&SystemEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    pub(crate) fn register(&self, actor: Arc<dyn ErasedActor>) -> Result<(), SpawnError> {
        let mut registry = self.inner.registry.write();
        if registry.contains_key(actor.id()) {
            return Err(SpawnError::DuplicateId(actor.id().to_string()));
        }
        registry.insert(actor.id().to_string(), actor);
        Ok(())
    }

    /// Remove an actor that never started, without notifications.
    pub(crate) fn forget(&self, id: &str) {
        self.inner.registry.write().remove(id);
    }

    pub(crate) fn announce_spawned(&self, id: &str, parent: Option<&str>) {
        self.inner.bus.publish(&SystemEvent::Spawned {
            actor_id: id.to_string(),
            parent: parent.map(str::to_string),
        });
    }

    /// Remove a stopping actor. Only the call that actually removes the
    /// entry publishes `Stopped`.
    pub(crate) fn deregister(&self, id: &str) {
        let removed = self.inner.registry.write().remove(id).is_some();
        if removed {
            self.inner.bus.publish(&SystemEvent::Stopped {
                actor_id: id.to_string(),
            });
        }
    }
}

/// Dropping the last handle stops every actor still registered.
impl Drop for SystemInner {
    fn drop(&mut self) {
        let registry = self.registry.get_mut();
        if registry.is_empty() {
            return;
        }
        debug!(system_id = %self.id, actors = registry.len(), "system dropped; stopping actors");
        for actor in registry.values() {
            actor.request_stop();
        }
    }
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("id", &self.inner.id)
            .field("actors", &self.len())
            .finish()
    }
}
