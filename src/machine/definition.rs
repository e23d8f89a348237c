//! Machine definitions: the declarative, immutable description of a machine.

use crate::core::{Event, GuardExpr, State};
use crate::machine::error::HandlerError;
use crate::machine::slot::{EffectSlot, SlotKind};
use crate::machine::transition::{AlwaysTransition, Transition, TransitionHandler};
use std::collections::BTreeSet;
use std::future::Future;

/// An effect slot attached to a state tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectRegistration {
    pub state: String,
    pub slot: String,
}

/// Declaration of a state machine.
///
/// Every builder step consumes the definition and returns a new one; the
/// value never changes once it has been handed to `provide`. Guard leaves
/// and effect registrations are recorded as slots automatically.
///
/// # Example
///
/// ```rust
/// use statecraft::machine::MachineDefinition;
/// use statecraft::{event_enum, state_enum};
///
/// state_enum! {
///     pub enum Fetch {
///         Idle,
///         Loading,
///         Success { data: String },
///     }
/// }
///
/// event_enum! {
///     pub enum FetchEvent {
///         Fetch,
///         Resolve(String),
///     }
/// }
///
/// let definition = MachineDefinition::new(Fetch::Idle)
///     .on("Idle", "Fetch", |_, _| Fetch::Loading)
///     .on("Loading", "Resolve", |_, e| match e {
///         FetchEvent::Resolve(data) => Fetch::Success { data: data.clone() },
///         _ => Fetch::Loading,
///     })
///     .final_state("Success");
///
/// assert_eq!(definition.transitions().len(), 2);
/// assert!(definition.is_final("Success"));
/// assert!(definition.slots().is_empty());
/// ```
pub struct MachineDefinition<S, E> {
    initial: S,
    transitions: Vec<Transition<S, E>>,
    always: Vec<AlwaysTransition<S>>,
    enter: Vec<EffectRegistration>,
    exit: Vec<EffectRegistration>,
    spawn: Vec<EffectRegistration>,
    background: Vec<String>,
    finals: BTreeSet<String>,
    slots: Vec<EffectSlot>,
}

impl<S: State, E: Event> MachineDefinition<S, E> {
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            transitions: Vec::new(),
            always: Vec::new(),
            enter: Vec::new(),
            exit: Vec::new(),
            spawn: Vec::new(),
            background: Vec::new(),
            finals: BTreeSet::new(),
            slots: Vec::new(),
        }
    }

    /// Add a synchronous, unguarded transition.
    pub fn on<F>(self, from: impl Into<String>, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&S, &E) -> S + Send + Sync + 'static,
    {
        self.add_transition(Transition::new(from, event, TransitionHandler::sync(handler)))
    }

    /// Add an unguarded transition whose handler may suspend.
    pub fn on_async<F, Fut>(
        self,
        from: impl Into<String>,
        event: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(S, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, HandlerError>> + Send + 'static,
    {
        self.add_transition(Transition::new(
            from,
            event,
            TransitionHandler::suspending(handler),
        ))
    }

    /// Add a fully specified transition, registering its guard slots.
    pub fn add_transition(mut self, transition: Transition<S, E>) -> Self {
        if let Some(guard) = &transition.guard {
            for name in guard.slot_names() {
                self.slots.push(EffectSlot {
                    kind: SlotKind::Guard,
                    state: Some(transition.from.clone()),
                    event: Some(transition.event.clone()),
                    name: name.to_string(),
                });
            }
        }
        self.transitions.push(transition);
        self
    }

    /// Add an always-transition; the cascade order is registration order.
    pub fn always<F>(self, from: impl Into<String>, guard: Option<GuardExpr>, handler: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        let mut always = AlwaysTransition::new(from, handler);
        always.guard = guard;
        self.add_always(always)
    }

    pub fn add_always(mut self, always: AlwaysTransition<S>) -> Self {
        if let Some(guard) = &always.guard {
            for name in guard.slot_names() {
                self.slots.push(EffectSlot {
                    kind: SlotKind::Guard,
                    state: Some(always.from.clone()),
                    event: None,
                    name: name.to_string(),
                });
            }
        }
        self.always.push(always);
        self
    }

    /// Call the effect slot `slot` every time `state` is entered.
    pub fn on_enter(mut self, state: impl Into<String>, slot: impl Into<String>) -> Self {
        let registration = self.register(SlotKind::OnEnter, state.into(), slot.into());
        self.enter.push(registration);
        self
    }

    /// Call the effect slot `slot` every time `state` is left.
    pub fn on_exit(mut self, state: impl Into<String>, slot: impl Into<String>) -> Self {
        let registration = self.register(SlotKind::OnExit, state.into(), slot.into());
        self.exit.push(registration);
        self
    }

    /// Fork the effect slot `slot` while `state` is active; it is
    /// interrupted when the state is left.
    pub fn spawn(mut self, state: impl Into<String>, slot: impl Into<String>) -> Self {
        let registration = self.register(SlotKind::Invoke, state.into(), slot.into());
        self.spawn.push(registration);
        self
    }

    /// Run the effect slot `slot` for the whole lifetime of the actor.
    pub fn background(mut self, slot: impl Into<String>) -> Self {
        let slot = slot.into();
        self.slots.push(EffectSlot {
            kind: SlotKind::Background,
            state: None,
            event: None,
            name: slot.clone(),
        });
        self.background.push(slot);
        self
    }

    /// Mark `state` as final: entering it stops the actor.
    pub fn final_state(mut self, state: impl Into<String>) -> Self {
        self.finals.insert(state.into());
        self
    }

    /// Replace the initial state, keeping everything else.
    pub fn with_initial(mut self, initial: S) -> Self {
        self.initial = initial;
        self
    }

    fn register(&mut self, kind: SlotKind, state: String, slot: String) -> EffectRegistration {
        self.slots.push(EffectSlot {
            kind,
            state: Some(state.clone()),
            event: None,
            name: slot.clone(),
        });
        EffectRegistration { state, slot }
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }

    pub fn transitions(&self) -> &[Transition<S, E>] {
        &self.transitions
    }

    pub fn always_transitions(&self) -> &[AlwaysTransition<S>] {
        &self.always
    }

    pub fn enter_effects(&self) -> &[EffectRegistration] {
        &self.enter
    }

    pub fn exit_effects(&self) -> &[EffectRegistration] {
        &self.exit
    }

    pub fn spawn_effects(&self) -> &[EffectRegistration] {
        &self.spawn
    }

    pub fn background_effects(&self) -> &[String] {
        &self.background
    }

    pub fn final_states(&self) -> impl Iterator<Item = &str> {
        self.finals.iter().map(String::as_str)
    }

    pub fn is_final(&self, state: &str) -> bool {
        self.finals.contains(state)
    }

    /// Every registered slot, including repeats of the same name.
    pub fn slots(&self) -> &[EffectSlot] {
        &self.slots
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.iter().any(|slot| slot.name == name)
    }
}

impl<S: State, E: Event> Clone for MachineDefinition<S, E> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            transitions: self.transitions.clone(),
            always: self.always.clone(),
            enter: self.enter.clone(),
            exit: self.exit.clone(),
            spawn: self.spawn.clone(),
            background: self.background.clone(),
            finals: self.finals.clone(),
            slots: self.slots.clone(),
        }
    }
}
