//! Effect execution context.

use crate::core::{Event, State};
use crate::machine::IntoMachine;
use crate::runtime::actor::{ActorRef, Launch};
use crate::runtime::error::SpawnError;
use crate::runtime::scope::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an effect is running.
///
/// `Enter` is the pseudo-event delivered to lifecycle effects when a state
/// is entered; it never appears in the public mailbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectTrigger {
    Enter,
    Exit,
    Invoke,
    Background,
}

impl fmt::Display for EffectTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EffectTrigger::Enter => "enter",
            EffectTrigger::Exit => "exit",
            EffectTrigger::Invoke => "invoke",
            EffectTrigger::Background => "background",
        };
        f.write_str(name)
    }
}

/// Everything an effect handler may touch.
///
/// `state` is the state being entered (or left, for exit effects). Child
/// actors spawned through [`EffectContext::spawn_child`] belong to the scope
/// the effect runs in and are stopped when that scope closes.
pub struct EffectContext<S, E> {
    pub state: S,
    pub trigger: EffectTrigger,
    actor: ActorRef<S, E>,
    scope: Scope,
}

impl<S: State, E: Event> EffectContext<S, E> {
    pub(crate) fn new(state: S, trigger: EffectTrigger, actor: ActorRef<S, E>, scope: Scope) -> Self {
        Self {
            state,
            trigger,
            actor,
            scope,
        }
    }

    pub fn actor_id(&self) -> &str {
        self.actor.id()
    }

    /// Enqueue an event on the owning actor's mailbox.
    pub fn send(&self, event: E) {
        self.actor.send(event);
    }

    pub fn self_ref(&self) -> ActorRef<S, E> {
        self.actor.clone()
    }

    /// Ask the owning actor to stop at its next suspension point.
    ///
    /// Unlike [`ActorRef::stop`] this does not wait, so it is safe to call
    /// from an effect the event loop is itself awaiting.
    pub fn request_stop(&self) {
        self.actor.request_stop();
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Spawn an actor whose lifetime is bounded by this effect's scope.
    ///
    /// The child inherits the parent's configuration and inspector and is
    /// registered with the parent's system, if any.
    pub async fn spawn_child<S2, E2>(
        &self,
        id: impl Into<String>,
        machine: impl IntoMachine<S2, E2>,
    ) -> Result<ActorRef<S2, E2>, SpawnError>
    where
        S2: State,
        E2: Event,
    {
        let machine = machine.into_machine()?;
        Launch::new(id.into(), machine, self.actor.context().clone())
            .with_parent(self.actor.id().to_string())
            .start(Some(&self.scope))
            .await
    }
}

impl<S: State, E: Event> Clone for EffectContext<S, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            trigger: self.trigger,
            actor: self.actor.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<S: State, E: Event> fmt::Debug for EffectContext<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectContext")
            .field("actor_id", &self.actor.id())
            .field("state", &self.state)
            .field("trigger", &self.trigger)
            .finish()
    }
}
