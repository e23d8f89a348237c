//! Provisioned machines: definitions with every slot bound to a handler.

use crate::core::{Event, GuardExpr, State};
use crate::machine::definition::MachineDefinition;
use crate::machine::error::{HandlerError, ProvideError, ReplayError, SlotError};
use crate::machine::index::TransitionIndex;
use crate::machine::slot::{
    EffectHandler, GuardContext, GuardHandler, SlotHandler, SlotHandlers, SlotKind,
};
use crate::machine::transition::{panic_message, AlwaysTransition, Transition};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::{error, warn};

/// Iteration ceiling for always-transition cascades.
pub const DEFAULT_MAX_ALWAYS_ITERATIONS: usize = 100;

/// Result of applying one event to a state.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<S> {
    pub state: S,
    /// Exit/enter effects run: the tag changed or the transition re-enters.
    pub lifecycle: bool,
}

/// Result of running an always-cascade to a fixed point.
#[derive(Clone, Debug, PartialEq)]
pub struct Settled<S> {
    pub state: S,
    /// Every intermediate state committed by the cascade, in order.
    pub steps: Vec<S>,
    /// The cascade stopped because it hit the iteration ceiling.
    pub exhausted: bool,
}

/// A machine definition whose slots are all bound, ready to run.
///
/// Cloning is cheap; clones share the definition, index and handlers.
pub struct Machine<S, E> {
    inner: Arc<MachineInner<S, E>>,
}

struct MachineInner<S, E> {
    definition: MachineDefinition<S, E>,
    index: TransitionIndex,
    guards: HashMap<String, GuardHandler<S, E>>,
    effects: HashMap<String, EffectHandler<S, E>>,
}

impl<S, E> Clone for Machine<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Bind `handlers` to the slots of `definition`.
///
/// Fails before any actor exists if a registered slot has no handler, a
/// handler matches no slot, or a handler has the wrong kind. Every problem
/// is reported at once; no partially provisioned machine is ever returned.
pub fn provide<S: State, E: Event>(
    definition: MachineDefinition<S, E>,
    handlers: SlotHandlers<S, E>,
) -> Result<Machine<S, E>, ProvideError> {
    let handlers = handlers.into_inner();
    let mut checks: Vec<Validation<(), NonEmptyVec<SlotError>>> = Vec::new();

    let mut seen: Vec<(&str, SlotKind)> = Vec::new();
    for slot in definition.slots() {
        if seen.contains(&(slot.name.as_str(), slot.kind)) {
            continue;
        }
        seen.push((slot.name.as_str(), slot.kind));

        let check = match handlers.get(&slot.name) {
            None => Validation::fail(SlotError::Missing {
                name: slot.name.clone(),
                kind: slot.kind,
            }),
            Some(handler) if handler.accepts(slot.kind) => Validation::success(()),
            Some(handler) => Validation::fail(SlotError::KindMismatch {
                name: slot.name.clone(),
                expected: slot.kind,
                found: handler.kind_label(),
            }),
        };
        checks.push(check);
    }

    let mut unknown: Vec<&String> = handlers
        .keys()
        .filter(|name| !definition.has_slot(name))
        .collect();
    unknown.sort();
    for name in unknown {
        checks.push(Validation::fail(SlotError::Unknown { name: name.clone() }));
    }

    if let Validation::Failure(errors) = Validation::all_vec(checks) {
        return Err(ProvideError::new(errors.iter().cloned().collect()));
    }

    let mut guards = HashMap::new();
    let mut effects = HashMap::new();
    for (name, handler) in handlers {
        match handler {
            SlotHandler::Guard(h) => {
                guards.insert(name, h);
            }
            SlotHandler::Effect(h) => {
                effects.insert(name, h);
            }
        }
    }

    Ok(Machine::assemble(definition, guards, effects))
}

impl<S: State, E: Event> Machine<S, E> {
    fn assemble(
        definition: MachineDefinition<S, E>,
        guards: HashMap<String, GuardHandler<S, E>>,
        effects: HashMap<String, EffectHandler<S, E>>,
    ) -> Self {
        let index = TransitionIndex::build(&definition);
        Self {
            inner: Arc::new(MachineInner {
                definition,
                index,
                guards,
                effects,
            }),
        }
    }

    /// Provision a definition that registers no slots.
    pub fn from_definition(definition: MachineDefinition<S, E>) -> Result<Self, ProvideError> {
        provide(definition, SlotHandlers::new())
    }

    pub fn definition(&self) -> &MachineDefinition<S, E> {
        &self.inner.definition
    }

    pub fn index(&self) -> &TransitionIndex {
        &self.inner.index
    }

    pub fn initial_state(&self) -> &S {
        self.inner.definition.initial()
    }

    pub fn is_final(&self, state: &str) -> bool {
        self.inner.definition.is_final(state)
    }

    /// Candidate transitions for `(state, event)` in registration order.
    pub fn resolve<'a>(
        &'a self,
        state: &str,
        event: &str,
    ) -> impl Iterator<Item = &'a Transition<S, E>> + 'a {
        let transitions = self.inner.definition.transitions();
        self.inner
            .index
            .transitions(state, event)
            .iter()
            .map(move |&i| &transitions[i])
    }

    /// Evaluate a guard expression against a state and optional event.
    pub async fn evaluate_guard(&self, guard: &GuardExpr, state: &S, event: Option<&E>) -> bool {
        let context = GuardContext {
            state: state.clone(),
            event: event.cloned(),
        };
        let leaf = |name: &str| -> BoxFuture<'static, bool> {
            match self.inner.guards.get(name) {
                Some(handler) => call_guard(name, handler, context.clone()),
                None => {
                    error!(slot = name, "guard slot has no handler; treating as false");
                    futures::future::ready(false).boxed()
                }
            }
        };
        guard.evaluate(&leaf).await
    }

    /// First candidate whose guard is absent or passes.
    pub async fn pick_transition(&self, state: &S, event: &E) -> Option<&Transition<S, E>> {
        for transition in self.resolve(state.name(), event.name()) {
            let passes = match &transition.guard {
                None => true,
                Some(guard) => self.evaluate_guard(guard, state, Some(event)).await,
            };
            if passes {
                return Some(transition);
            }
        }
        None
    }

    /// First always-transition of the state's cascade that applies.
    pub async fn pick_always(&self, state: &S) -> Option<&AlwaysTransition<S>> {
        let always = self.inner.definition.always_transitions();
        for &position in self.inner.index.always(state.name()) {
            let candidate = &always[position];
            let passes = match &candidate.guard {
                None => true,
                Some(guard) => self.evaluate_guard(guard, state, None).await,
            };
            if passes {
                return Some(candidate);
            }
        }
        None
    }

    /// Apply `event` to `state`.
    ///
    /// `Ok(None)` means no transition matched and the event is a no-op.
    pub async fn transition(&self, state: &S, event: &E) -> Result<Option<Step<S>>, HandlerError> {
        let Some(transition) = self.pick_transition(state, event).await else {
            return Ok(None);
        };
        let next = transition.handler.run(state, event).await?;
        let lifecycle = next.name() != state.name() || transition.reenter;
        Ok(Some(Step {
            state: next,
            lifecycle,
        }))
    }

    /// Apply always-transitions until none matches, the tag stops changing,
    /// or `max_iterations` is reached.
    pub async fn settle(&self, state: S, max_iterations: usize) -> Settled<S> {
        let mut current = state;
        let mut steps = Vec::new();
        let mut iterations = 0;

        loop {
            if self.is_final(current.name()) {
                break;
            }
            let Some(always) = self.pick_always(&current).await else {
                break;
            };
            if iterations >= max_iterations {
                warn!(
                    state = current.name(),
                    max_iterations, "always-transition ceiling reached; cascade stopped"
                );
                return Settled {
                    state: current,
                    steps,
                    exhausted: true,
                };
            }
            iterations += 1;

            let next = match always.apply(&current) {
                Ok(next) => next,
                Err(e) => {
                    warn!(state = current.name(), error = %e, "always handler failed");
                    break;
                }
            };
            let tag_changed = next.name() != current.name();
            steps.push(next.clone());
            current = next;
            if !tag_changed {
                break;
            }
        }

        Settled {
            state: current,
            steps,
            exhausted: false,
        }
    }

    /// Re-apply a journaled event during restore.
    ///
    /// Only synchronous handlers are replayable; a suspending handler is
    /// rejected rather than skipped. An event that matches no transition
    /// leaves the state unchanged, exactly as the live actor did.
    pub async fn replay(&self, state: S, event: &E, max_iterations: usize) -> Result<S, ReplayError> {
        let Some(transition) = self.pick_transition(&state, event).await else {
            return Ok(state);
        };
        let next = match transition.handler.run_sync(&state, event) {
            None => {
                return Err(ReplayError::AsyncHandler {
                    state: state.name().to_string(),
                    event: event.name().to_string(),
                })
            }
            Some(Err(source)) => {
                return Err(ReplayError::Handler {
                    state: state.name().to_string(),
                    event: event.name().to_string(),
                    source,
                })
            }
            Some(Ok(next)) => next,
        };

        if next.name() == state.name() {
            return Ok(next);
        }
        Ok(self.settle(next, max_iterations).await.state)
    }

    pub(crate) fn effect(&self, slot: &str) -> Option<&EffectHandler<S, E>> {
        self.inner.effects.get(slot)
    }

    /// Effect slots to call on entry to `state`.
    pub fn enter_slots(&self, state: &str) -> Vec<&str> {
        let registrations = self.inner.definition.enter_effects();
        self.inner
            .index
            .enter(state)
            .iter()
            .map(|&i| registrations[i].slot.as_str())
            .collect()
    }

    /// Effect slots to call on exit from `state`.
    pub fn exit_slots(&self, state: &str) -> Vec<&str> {
        let registrations = self.inner.definition.exit_effects();
        self.inner
            .index
            .exit(state)
            .iter()
            .map(|&i| registrations[i].slot.as_str())
            .collect()
    }

    /// Effect slots forked into the state scope while `state` is active.
    pub fn spawn_slots(&self, state: &str) -> Vec<&str> {
        let registrations = self.inner.definition.spawn_effects();
        self.inner
            .index
            .spawn(state)
            .iter()
            .map(|&i| registrations[i].slot.as_str())
            .collect()
    }

    pub fn background_slots(&self) -> Vec<&str> {
        self.inner
            .definition
            .background_effects()
            .iter()
            .map(String::as_str)
            .collect()
    }
}

fn call_guard<S: State, E: Event>(
    name: &str,
    handler: &GuardHandler<S, E>,
    context: GuardContext<S, E>,
) -> BoxFuture<'static, bool> {
    let handler = Arc::clone(handler);
    let name = name.to_string();
    AssertUnwindSafe(async move { handler(context).await })
        .catch_unwind()
        .map(move |result| {
            result.unwrap_or_else(|payload| {
                warn!(slot = %name, panic = %panic_message(payload), "guard panicked; treating as false");
                false
            })
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::transition::TransitionHandler;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum Gate {
        Closed,
        Open { by: String },
        Checking { n: u32 },
        Low,
        Mid,
        High,
    }

    impl State for Gate {
        fn name(&self) -> &str {
            match self {
                Self::Closed => "Closed",
                Self::Open { .. } => "Open",
                Self::Checking { .. } => "Checking",
                Self::Low => "Low",
                Self::Mid => "Mid",
                Self::High => "High",
            }
        }
    }

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum GateEvent {
        Push(String),
        Check(u32),
    }

    impl Event for GateEvent {
        fn name(&self) -> &str {
            match self {
                Self::Push(_) => "Push",
                Self::Check(_) => "Check",
            }
        }
    }

    fn push_transition(to: &'static str) -> Transition<Gate, GateEvent> {
        Transition::new(
            "Closed",
            "Push",
            TransitionHandler::sync(move |_, e: &GateEvent| match e {
                GateEvent::Push(who) => Gate::Open {
                    by: format!("{}:{}", to, who),
                },
                _ => Gate::Closed,
            }),
        )
    }

    #[test]
    fn provide_rejects_missing_slot() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed)
            .add_transition(push_transition("a").with_guard("x"));

        let error = provide(definition, SlotHandlers::new()).err().unwrap();
        assert_eq!(error.missing(), vec!["x"]);
    }

    #[test]
    fn provide_rejects_unknown_handler() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed);
        let handlers = SlotHandlers::new().guard("stray", |_, _| true);

        let error = provide(definition, handlers).err().unwrap();
        assert_eq!(error.unknown(), vec!["stray"]);
    }

    #[test]
    fn provide_reports_all_problems_together() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed)
            .add_transition(push_transition("a").with_guard(GuardExpr::slot("x").and("y".into())))
            .on_enter("Open", "chime");
        let handlers = SlotHandlers::new()
            .guard("y", |_, _| true)
            .guard("chime", |_, _| true)
            .guard("extra", |_, _| true);

        let error = provide(definition, handlers).err().unwrap();
        assert_eq!(error.errors.len(), 3);
        assert_eq!(error.missing(), vec!["x"]);
        assert_eq!(error.unknown(), vec!["extra"]);
        assert!(error
            .errors
            .iter()
            .any(|e| matches!(e, SlotError::KindMismatch { name, .. } if name == "chime")));
    }

    #[tokio::test]
    async fn first_passing_candidate_wins() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed)
            .add_transition(push_transition("first").with_guard("no"))
            .add_transition(push_transition("second").with_guard("yes"))
            .add_transition(push_transition("third"));
        let handlers = SlotHandlers::new()
            .guard("no", |_, _| false)
            .guard("yes", |_, _| true);
        let machine = provide(definition, handlers).unwrap();

        let step = machine
            .transition(&Gate::Closed, &GateEvent::Push("ann".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            step.state,
            Gate::Open {
                by: "second:ann".into()
            }
        );
        assert!(step.lifecycle);
    }

    #[tokio::test]
    async fn unmatched_event_is_a_no_op() {
        let machine = Machine::from_definition(
            MachineDefinition::<Gate, GateEvent>::new(Gate::Closed).add_transition(push_transition("a")),
        )
        .unwrap();

        let step = machine.transition(&Gate::Closed, &GateEvent::Check(1)).await.unwrap();
        assert!(step.is_none());
    }

    #[tokio::test]
    async fn guards_see_the_event() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed)
            .add_transition(push_transition("a").with_guard("isBob"));
        let handlers = SlotHandlers::new().guard("isBob", |_, e: Option<&GateEvent>| {
            matches!(e, Some(GateEvent::Push(who)) if who == "bob")
        });
        let machine = provide(definition, handlers).unwrap();

        assert!(machine
            .pick_transition(&Gate::Closed, &GateEvent::Push("ann".into()))
            .await
            .is_none());
        assert!(machine
            .pick_transition(&Gate::Closed, &GateEvent::Push("bob".into()))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn panicking_guard_counts_as_false() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed)
            .add_transition(push_transition("a").with_guard("explodes"));
        let handlers = SlotHandlers::new().guard("explodes", |_, _| panic!("guard bug"));
        let machine = provide(definition, handlers).unwrap();

        assert!(machine
            .pick_transition(&Gate::Closed, &GateEvent::Push("x".into()))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn always_cascade_is_first_match() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Checking { n: 0 })
            .always("Checking", Some("isLow".into()), |_| Gate::Low)
            .always("Checking", Some("isMid".into()), |_| Gate::Mid)
            .always("Checking", None, |_| Gate::High);
        let handlers = SlotHandlers::new()
            .guard("isLow", |s: &Gate, _| matches!(s, Gate::Checking { n } if *n < 10))
            .guard("isMid", |s: &Gate, _| matches!(s, Gate::Checking { n } if *n < 100));
        let machine = provide(definition, handlers).unwrap();

        let low = machine.settle(Gate::Checking { n: 5 }, 100).await;
        let mid = machine.settle(Gate::Checking { n: 50 }, 100).await;
        let high = machine.settle(Gate::Checking { n: 500 }, 100).await;
        assert_eq!(low.state, Gate::Low);
        assert_eq!(mid.state, Gate::Mid);
        assert_eq!(high.state, Gate::High);
        assert_eq!(high.steps, vec![Gate::High]);
    }

    #[tokio::test]
    async fn cyclic_always_chain_hits_ceiling() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Low)
            .always("Low", None, |_| Gate::High)
            .always("High", None, |_| Gate::Low);
        let machine = Machine::from_definition(definition).unwrap();

        let settled = machine.settle(Gate::Low, 100).await;
        assert!(settled.exhausted);
        assert_eq!(settled.steps.len(), 100);
        assert_eq!(settled.state, Gate::Low);
    }

    #[tokio::test]
    async fn replay_rejects_suspending_handlers() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed).on_async(
            "Closed",
            "Push",
            |_, _| async { Ok(Gate::Open { by: "async".into() }) },
        );
        let machine = Machine::from_definition(definition).unwrap();

        let result = machine
            .replay(Gate::Closed, &GateEvent::Push("x".into()), 100)
            .await;
        assert!(matches!(result, Err(ReplayError::AsyncHandler { .. })));
    }

    #[tokio::test]
    async fn replay_applies_sync_handlers_and_always() {
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed)
            .on("Closed", "Check", |_, e| match e {
                GateEvent::Check(n) => Gate::Checking { n: *n },
                _ => Gate::Closed,
            })
            .always("Checking", None, |_| Gate::Mid);
        let machine = Machine::from_definition(definition).unwrap();

        let state = machine
            .replay(Gate::Closed, &GateEvent::Check(3), 100)
            .await
            .unwrap();
        assert_eq!(state, Gate::Mid);
    }

    #[tokio::test]
    async fn async_guards_are_awaited() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let definition = MachineDefinition::<Gate, GateEvent>::new(Gate::Closed)
            .add_transition(push_transition("a").with_guard("slow"));
        let handlers = SlotHandlers::new().guard_async("slow", move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });
        let machine = provide(definition, handlers).unwrap();

        assert!(machine
            .pick_transition(&Gate::Closed, &GateEvent::Push("x".into()))
            .await
            .is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
