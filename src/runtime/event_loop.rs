//! The mailbox loop driving one actor.
//!
//! One task per actor reads the mailbox and is the only writer of the
//! actor's state. Each event is processed to completion (guards, handler,
//! lifecycle effects, always-cascade, commit hook) before the next one is
//! read, so commits are totally ordered per actor.
//!
//! A stop request is honoured between events. An effect still running when
//! it arrives is interrupted, but the event that triggered it is committed.

use crate::core::{Event, State};
use crate::machine::{panic_message, EffectHandler, Machine};
use crate::runtime::actor::{ActorRef, ActorStatus, Channels, Envelope, Launch};
use crate::runtime::effect::{EffectContext, EffectTrigger};
use crate::runtime::error::EffectError;
use crate::runtime::hook::{Commit, CommitHook};
use crate::runtime::inspector::{notify, Inspection, Inspector};
use crate::runtime::scope::Scope;
use crate::system::WeakSystem;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace, warn};

pub(crate) struct EventLoop<S, E> {
    actor: ActorRef<S, E>,
    machine: Machine<S, E>,
    mailbox: mpsc::UnboundedReceiver<Envelope<S, E>>,
    stop: watch::Receiver<bool>,
    hook: Option<Arc<dyn CommitHook<S, E>>>,
    inspector: Option<Arc<dyn Inspector>>,
    system: Option<WeakSystem>,
    max_always_iterations: usize,
    state: S,
    state_scope: Scope,
    lifetime_scope: Scope,
}

impl<S: State, E: Event> EventLoop<S, E> {
    pub(crate) fn prepare(launch: Launch<S, E>) -> (ActorRef<S, E>, Self) {
        let Launch {
            id,
            machine,
            context,
            parent,
            hook,
            initial,
        } = launch;
        let initial = initial.unwrap_or_else(|| machine.initial_state().clone());
        let inspector = context.inspector.clone();
        let system = context.system.clone();
        let max_always_iterations = context.config.max_always_iterations;

        let (actor, Channels { mailbox, stop }) = ActorRef::create(
            id.clone(),
            parent,
            machine.clone(),
            context,
            initial.clone(),
        );
        let event_loop = Self {
            actor: actor.clone(),
            machine,
            mailbox,
            stop,
            hook,
            inspector,
            system,
            max_always_iterations,
            state: initial,
            state_scope: Scope::new(format!("{}/state", id)),
            lifetime_scope: Scope::new(format!("{}/lifetime", id)),
        };
        (actor, event_loop)
    }

    /// Run the loop on its own task.
    pub(crate) fn spawn(self) {
        let actor = self.actor.clone();
        tokio::spawn(async move {
            if let Err(payload) = AssertUnwindSafe(self.run()).catch_unwind().await {
                error!(
                    actor_id = %actor.id(),
                    panic = %panic_message(payload),
                    "event loop panicked; actor stopped"
                );
                actor.finish();
            }
        });
    }

    async fn run(mut self) {
        if self.start().await {
            self.serve().await;
        }
        self.teardown().await;
    }

    /// Returns `false` when the initial state is already final.
    async fn start(&mut self) -> bool {
        let settled = self
            .machine
            .settle(self.state.clone(), self.max_always_iterations)
            .await;
        self.state = settled.state;
        self.actor.publish(&self.state);

        if let Some(hook) = &self.hook {
            hook.on_start(self.actor.id(), &self.state).await;
        }
        notify(self.inspector.as_ref(), || Inspection::Spawned {
            actor_id: self.actor.id().to_string(),
            parent: self.actor.parent_id().map(str::to_string),
            state: self.state.name().to_string(),
        });
        debug!(actor_id = %self.actor.id(), state = self.state.name(), "actor started");

        if self.machine.is_final(self.state.name()) {
            self.enter_state().await;
            self.actor.set_status(ActorStatus::Running);
            return false;
        }

        for slot in self.machine.background_slots() {
            self.fork_effect(slot, EffectTrigger::Background, &self.lifetime_scope);
        }
        self.enter_state().await;
        self.actor.set_status(ActorStatus::Running);
        true
    }

    async fn serve(&mut self) {
        loop {
            let envelope = tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop) => break,
                envelope = self.mailbox.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            match envelope {
                Envelope::Query(reply) => {
                    let _ = reply.send(self.state.clone());
                }
                Envelope::Event(event) => {
                    self.process(event).await;
                    if self.machine.is_final(self.state.name()) {
                        break;
                    }
                }
            }
        }
    }

    async fn process(&mut self, event: E) {
        notify(self.inspector.as_ref(), || Inspection::EventReceived {
            actor_id: self.actor.id().to_string(),
            event: event.name().to_string(),
        });

        let previous = self.state.clone();
        let step = match self.machine.transition(&previous, &event).await {
            Ok(Some(step)) => step,
            Ok(None) => {
                trace!(
                    actor_id = %self.actor.id(),
                    state = previous.name(),
                    event = event.name(),
                    "no transition; event dropped"
                );
                return;
            }
            Err(e) => {
                warn!(
                    actor_id = %self.actor.id(),
                    state = previous.name(),
                    event = event.name(),
                    error = %e,
                    "transition handler failed; event dropped"
                );
                return;
            }
        };

        let tag_changed = step.state.name() != previous.name();
        let mut lifecycle = step.lifecycle;
        self.advance(step.state, step.lifecycle).await;
        if tag_changed {
            lifecycle |= self.cascade().await;
        }

        if let Some(hook) = &self.hook {
            let commit = Commit {
                actor_id: self.actor.id(),
                previous: &previous,
                state: &self.state,
                event: &event,
                lifecycle,
            };
            hook.on_commit(&commit).await;
        }
    }

    /// Apply always-transitions after a tag change until none applies.
    ///
    /// Returns whether any of them ran a lifecycle.
    async fn cascade(&mut self) -> bool {
        let machine = self.machine.clone();
        let mut lifecycle = false;
        let mut iterations = 0;

        while !machine.is_final(self.state.name()) {
            let Some(always) = machine.pick_always(&self.state).await else {
                break;
            };
            if iterations >= self.max_always_iterations {
                warn!(
                    actor_id = %self.actor.id(),
                    state = self.state.name(),
                    max_iterations = self.max_always_iterations,
                    "always-transition ceiling reached; cascade stopped"
                );
                break;
            }
            iterations += 1;

            let next = match always.apply(&self.state) {
                Ok(next) => next,
                Err(e) => {
                    warn!(actor_id = %self.actor.id(), error = %e, "always handler failed");
                    break;
                }
            };
            let changed = next.name() != self.state.name();
            self.advance(next, changed).await;
            lifecycle |= changed;
            if !changed {
                break;
            }
        }
        lifecycle
    }

    /// Commit `next`; with `lifecycle`, leave the current state first and
    /// enter the new one afterwards.
    async fn advance(&mut self, next: S, lifecycle: bool) {
        let from = self.state.name().to_string();

        if lifecycle {
            for slot in self.machine.exit_slots(&from) {
                self.run_effect(slot, EffectTrigger::Exit).await;
            }
            self.state_scope.close().await;
        }

        self.state = next;
        self.actor.publish(&self.state);
        notify(self.inspector.as_ref(), || Inspection::Transition {
            actor_id: self.actor.id().to_string(),
            from: from.clone(),
            to: self.state.name().to_string(),
        });

        if lifecycle {
            self.state_scope = Scope::new(format!("{}/state", self.actor.id()));
            self.enter_state().await;
        }
    }

    /// Run entry effects inline and fork invoke effects into the state scope.
    ///
    /// A final state closes its scope right after entry, so its invoke
    /// effects run inline too.
    async fn enter_state(&mut self) {
        let tag = self.state.name().to_string();
        for slot in self.machine.enter_slots(&tag) {
            self.run_effect(slot, EffectTrigger::Enter).await;
        }
        if self.machine.is_final(&tag) {
            for slot in self.machine.spawn_slots(&tag) {
                self.run_effect(slot, EffectTrigger::Invoke).await;
            }
            return;
        }
        for slot in self.machine.spawn_slots(&tag) {
            self.fork_effect(slot, EffectTrigger::Invoke, &self.state_scope);
        }
    }

    /// Run an effect to completion or until a stop is requested.
    async fn run_effect(&self, slot: &str, trigger: EffectTrigger) {
        let Some(handler) = self.machine.effect(slot) else {
            return;
        };
        let context = EffectContext::new(
            self.state.clone(),
            trigger,
            self.actor.clone(),
            self.state_scope.clone(),
        );
        let mut stop = self.stop.clone();
        let outcome = tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => {
                debug!(actor_id = %self.actor.id(), slot, %trigger, "effect interrupted by stop");
                return;
            }
            outcome = guarded(handler, context) => outcome,
        };
        report_effect(self.actor.id(), self.inspector.as_ref(), slot, trigger, outcome);
    }

    fn fork_effect(&self, slot: &str, trigger: EffectTrigger, scope: &Scope) {
        let Some(handler) = self.machine.effect(slot) else {
            return;
        };
        let handler = Arc::clone(handler);
        let context = EffectContext::new(self.state.clone(), trigger, self.actor.clone(), scope.clone());
        let actor_id = self.actor.id().to_string();
        let inspector = self.inspector.clone();
        let slot = slot.to_string();

        scope.fork(async move {
            let outcome = guarded(&handler, context).await;
            report_effect(&actor_id, inspector.as_ref(), &slot, trigger, outcome);
        });
    }

    async fn teardown(mut self) {
        self.state_scope.close().await;
        self.lifetime_scope.close().await;

        self.mailbox.close();
        while let Ok(envelope) = self.mailbox.try_recv() {
            if let Envelope::Query(reply) = envelope {
                let _ = reply.send(self.state.clone());
            }
        }

        if let Some(hook) = &self.hook {
            hook.on_stop(self.actor.id(), &self.state).await;
        }
        if let Some(system) = self.system.as_ref().and_then(WeakSystem::upgrade) {
            system.deregister(self.actor.id());
        }
        notify(self.inspector.as_ref(), || Inspection::Stopped {
            actor_id: self.actor.id().to_string(),
            state: self.state.name().to_string(),
        });
        debug!(actor_id = %self.actor.id(), state = self.state.name(), "actor stopped");
        self.actor.finish();
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn guarded<S: State, E: Event>(
    handler: &EffectHandler<S, E>,
    context: EffectContext<S, E>,
) -> Result<(), EffectError> {
    AssertUnwindSafe(handler(context))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(EffectError::Panicked(panic_message(payload))))
}

fn report_effect(
    actor_id: &str,
    inspector: Option<&Arc<dyn Inspector>>,
    slot: &str,
    trigger: EffectTrigger,
    outcome: Result<(), EffectError>,
) {
    if let Err(e) = &outcome {
        warn!(actor_id = %actor_id, slot, %trigger, error = %e, "effect failed");
    }
    notify(inspector, || Inspection::Effect {
        actor_id: actor_id.to_string(),
        slot: slot.to_string(),
        trigger: trigger.to_string(),
        error: outcome.err().map(|e| e.to_string()),
    });
}
