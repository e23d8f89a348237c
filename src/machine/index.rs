//! Lookup tables over a machine definition.
//!
//! The index stores positions into the definition's vectors, keyed by
//! state tag (and event tag for transitions). Candidate lists keep
//! registration order, which is the order guards are tried in.

use crate::core::{Event, State};
use crate::machine::definition::{EffectRegistration, MachineDefinition};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct TransitionIndex {
    transitions: HashMap<String, HashMap<String, Vec<usize>>>,
    always: HashMap<String, Vec<usize>>,
    enter: HashMap<String, Vec<usize>>,
    exit: HashMap<String, Vec<usize>>,
    spawn: HashMap<String, Vec<usize>>,
}

impl TransitionIndex {
    /// Build the index in one pass over the definition.
    pub fn build<S: State, E: Event>(definition: &MachineDefinition<S, E>) -> Self {
        let mut index = TransitionIndex::default();

        for (position, transition) in definition.transitions().iter().enumerate() {
            index
                .transitions
                .entry(transition.from.clone())
                .or_default()
                .entry(transition.event.clone())
                .or_default()
                .push(position);
        }

        for (position, always) in definition.always_transitions().iter().enumerate() {
            index
                .always
                .entry(always.from.clone())
                .or_default()
                .push(position);
        }

        index.enter = by_state(definition.enter_effects());
        index.exit = by_state(definition.exit_effects());
        index.spawn = by_state(definition.spawn_effects());
        index
    }

    /// Candidate transitions for `(state, event)`, in registration order.
    pub fn transitions(&self, state: &str, event: &str) -> &[usize] {
        self.transitions
            .get(state)
            .and_then(|events| events.get(event))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Event tags with at least one transition out of `state`.
    pub fn events_from(&self, state: &str) -> Vec<&str> {
        let mut events: Vec<&str> = self
            .transitions
            .get(state)
            .map(|events| events.keys().map(String::as_str).collect())
            .unwrap_or_default();
        events.sort_unstable();
        events
    }

    pub fn always(&self, state: &str) -> &[usize] {
        lookup(&self.always, state)
    }

    pub fn enter(&self, state: &str) -> &[usize] {
        lookup(&self.enter, state)
    }

    pub fn exit(&self, state: &str) -> &[usize] {
        lookup(&self.exit, state)
    }

    pub fn spawn(&self, state: &str) -> &[usize] {
        lookup(&self.spawn, state)
    }
}

fn by_state(registrations: &[EffectRegistration]) -> HashMap<String, Vec<usize>> {
    let mut table: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, registration) in registrations.iter().enumerate() {
        table
            .entry(registration.state.clone())
            .or_default()
            .push(position);
    }
    table
}

fn lookup<'a>(table: &'a HashMap<String, Vec<usize>>, state: &str) -> &'a [usize] {
    table.get(state).map(Vec::as_slice).unwrap_or(&[])
}
