//! Builder for constructing machine definitions.

use crate::builder::error::BuildError;
use crate::builder::transition::TransitionBuilder;
use crate::core::{Event, GuardExpr, State};
use crate::machine::{AlwaysTransition, MachineDefinition, Transition};
use std::collections::{HashMap, HashSet};

/// Builder for constructing machine definitions with validation.
///
/// Unlike [`MachineDefinition`]'s own chain, `build` checks that an initial
/// state was given and that no always-transition is shadowed by an earlier
/// unguarded one.
pub struct MachineBuilder<S, E> {
    initial: Option<S>,
    transitions: Vec<Transition<S, E>>,
    always: Vec<AlwaysTransition<S>>,
    enter: Vec<(String, String)>,
    exit: Vec<(String, String)>,
    spawn: Vec<(String, String)>,
    background: Vec<String>,
    finals: Vec<String>,
}

impl<S: State, E: Event> MachineBuilder<S, E> {
    /// Create a new machine builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            transitions: Vec::new(),
            always: Vec::new(),
            enter: Vec::new(),
            exit: Vec::new(),
            spawn: Vec::new(),
            background: Vec::new(),
            finals: Vec::new(),
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Add a transition using a builder.
    pub fn transition(mut self, builder: TransitionBuilder<S, E>) -> Result<Self, BuildError> {
        self.transitions.push(builder.build()?);
        Ok(self)
    }

    /// Add a pre-built transition.
    pub fn add_transition(mut self, transition: Transition<S, E>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add multiple transitions at once.
    pub fn transitions(mut self, transitions: Vec<Transition<S, E>>) -> Self {
        self.transitions.extend(transitions);
        self
    }

    /// Add an always-transition out of `from`.
    pub fn always<F>(mut self, from: impl Into<String>, guard: Option<GuardExpr>, handler: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        let mut always = AlwaysTransition::new(from, handler);
        always.guard = guard;
        self.always.push(always);
        self
    }

    pub fn on_enter(mut self, state: impl Into<String>, slot: impl Into<String>) -> Self {
        self.enter.push((state.into(), slot.into()));
        self
    }

    pub fn on_exit(mut self, state: impl Into<String>, slot: impl Into<String>) -> Self {
        self.exit.push((state.into(), slot.into()));
        self
    }

    pub fn spawn(mut self, state: impl Into<String>, slot: impl Into<String>) -> Self {
        self.spawn.push((state.into(), slot.into()));
        self
    }

    pub fn background(mut self, slot: impl Into<String>) -> Self {
        self.background.push(slot.into());
        self
    }

    pub fn final_state(mut self, state: impl Into<String>) -> Self {
        self.finals.push(state.into());
        self
    }

    /// Mark several states final, e.g. a `FINAL_STATES` list generated by
    /// [`state_enum!`](crate::state_enum).
    pub fn final_states<I>(mut self, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.finals.extend(states.into_iter().map(Into::into));
        self
    }

    /// Build the definition.
    pub fn build(self) -> Result<MachineDefinition<S, E>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        if self.transitions.is_empty() && self.always.is_empty() {
            return Err(BuildError::NoTransitions);
        }
        check_always_reachable(&self.always)?;

        let mut definition = MachineDefinition::new(initial);
        for transition in self.transitions {
            definition = definition.add_transition(transition);
        }
        for always in self.always {
            definition = definition.add_always(always);
        }
        for (state, slot) in self.enter {
            definition = definition.on_enter(state, slot);
        }
        for (state, slot) in self.exit {
            definition = definition.on_exit(state, slot);
        }
        for (state, slot) in self.spawn {
            definition = definition.spawn(state, slot);
        }
        for slot in self.background {
            definition = definition.background(slot);
        }
        for state in self.finals {
            definition = definition.final_state(state);
        }
        Ok(definition)
    }
}

impl<S: State, E: Event> Default for MachineBuilder<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_always_reachable<S>(always: &[AlwaysTransition<S>]) -> Result<(), BuildError> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut catch_all: HashSet<&str> = HashSet::new();

    for entry in always {
        let position = positions.entry(entry.from.as_str()).or_insert(0);
        if catch_all.contains(entry.from.as_str()) {
            return Err(BuildError::UnreachableAlways {
                state: entry.from.clone(),
                position: *position,
            });
        }
        if entry.guard.is_none() {
            catch_all.insert(entry.from.as_str());
        }
        *position += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::TransitionHandler;

    crate::state_enum! {
        enum TestState {
            Initial,
            Processing,
            Complete,
            Failed,
        }
        final: [Complete, Failed]
    }

    crate::event_enum! {
        enum TestEvent {
            Start,
            Finish,
        }
    }

    #[test]
    fn builder_creates_definition() {
        let definition = MachineBuilder::<TestState, TestEvent>::new()
            .initial(TestState::Initial)
            .transition(
                TransitionBuilder::new()
                    .from("Initial")
                    .on("Start")
                    .to(TestState::Processing),
            )
            .unwrap()
            .on_enter("Processing", "announce")
            .final_states(TestState::FINAL_STATES.iter().copied())
            .build()
            .unwrap();

        assert_eq!(definition.initial(), &TestState::Initial);
        assert_eq!(definition.transitions().len(), 1);
        assert!(definition.is_final("Complete"));
        assert!(definition.is_final("Failed"));
        assert!(definition.has_slot("announce"));
    }

    #[test]
    fn builder_requires_initial_state() {
        let result = MachineBuilder::<TestState, TestEvent>::new()
            .add_transition(Transition::new(
                "Initial",
                "Start",
                TransitionHandler::sync(|_, _| TestState::Processing),
            ))
            .build();

        assert!(matches!(result, Err(BuildError::MissingInitialState)));
    }

    #[test]
    fn builder_requires_transitions() {
        let result = MachineBuilder::<TestState, TestEvent>::new()
            .initial(TestState::Initial)
            .build();

        assert!(matches!(result, Err(BuildError::NoTransitions)));
    }

    #[test]
    fn transition_errors_propagate() {
        let result = MachineBuilder::<TestState, TestEvent>::new()
            .initial(TestState::Initial)
            .transition(TransitionBuilder::new().from("Initial").on("Start"));

        assert!(matches!(result, Err(BuildError::MissingHandler)));
    }

    #[test]
    fn shadowed_always_is_rejected() {
        let result = MachineBuilder::<TestState, TestEvent>::new()
            .initial(TestState::Processing)
            .always("Processing", Some(GuardExpr::slot("ok")), |_| TestState::Complete)
            .always("Processing", None, |_| TestState::Failed)
            .always("Processing", Some(GuardExpr::slot("late")), |_| TestState::Complete)
            .build();

        assert_eq!(
            result.err(),
            Some(BuildError::UnreachableAlways {
                state: "Processing".into(),
                position: 2,
            })
        );
    }

    #[test]
    fn catch_all_last_is_accepted() {
        let definition = MachineBuilder::<TestState, TestEvent>::new()
            .initial(TestState::Processing)
            .always("Processing", Some(GuardExpr::slot("ok")), |_| TestState::Complete)
            .always("Processing", None, |_| TestState::Failed)
            .always("Initial", None, |_| TestState::Processing)
            .build()
            .unwrap();

        assert_eq!(definition.always_transitions().len(), 3);
    }
}
