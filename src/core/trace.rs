//! Immutable state traces.
//!
//! A trace is the ordered list of committed states a machine passed
//! through. Recording returns a new trace, leaving the original untouched.

use super::state::State;
use serde::{Deserialize, Serialize};

/// Ordered sequence of committed states, starting with the initial one.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{State, StateTrace};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Step { A, B }
///
/// impl State for Step {
///     fn name(&self) -> &str {
///         match self {
///             Self::A => "A",
///             Self::B => "B",
///         }
///     }
/// }
///
/// let trace = StateTrace::new(Step::A);
/// let next = trace.record(Step::B);
///
/// assert_eq!(trace.len(), 1); // original unchanged
/// assert_eq!(next.tags(), vec!["A", "B"]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTrace<S: State> {
    states: Vec<S>,
}

impl<S: State> StateTrace<S> {
    pub fn new(initial: S) -> Self {
        Self {
            states: vec![initial],
        }
    }

    /// Record a committed state, returning a new trace.
    pub fn record(&self, state: S) -> Self {
        let mut states = self.states.clone();
        states.push(state);
        Self { states }
    }

    pub(crate) fn push(&mut self, state: S) {
        self.states.push(state);
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// Tags of every state in commit order.
    pub fn tags(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.name()).collect()
    }

    pub fn initial(&self) -> &S {
        &self.states[0]
    }

    /// The most recently committed state.
    pub fn last(&self) -> &S {
        &self.states[self.states.len() - 1]
    }

    /// Number of recorded states; never zero.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of transitions committed after the initial state.
    pub fn transitions(&self) -> usize {
        self.states.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestState {
        Initial,
        Processing,
        Complete,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Initial => "Initial",
                Self::Processing => "Processing",
                Self::Complete => "Complete",
            }
        }
    }

    #[test]
    fn new_trace_holds_initial_state() {
        let trace = StateTrace::new(TestState::Initial);
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.transitions(), 0);
        assert_eq!(trace.initial(), &TestState::Initial);
        assert_eq!(trace.last(), &TestState::Initial);
    }

    #[test]
    fn record_is_immutable() {
        let trace = StateTrace::new(TestState::Initial);
        let next = trace.record(TestState::Processing);

        assert_eq!(trace.len(), 1);
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn tags_follow_commit_order() {
        let trace = StateTrace::new(TestState::Initial)
            .record(TestState::Processing)
            .record(TestState::Complete);

        assert_eq!(trace.tags(), vec!["Initial", "Processing", "Complete"]);
        assert_eq!(trace.last(), &TestState::Complete);
        assert_eq!(trace.transitions(), 2);
    }

    #[test]
    fn trace_serializes_correctly() {
        let trace = StateTrace::new(TestState::Initial).record(TestState::Complete);
        let json = serde_json::to_string(&trace).unwrap();
        let back: StateTrace<TestState> = serde_json::from_str(&json).unwrap();
        assert_eq!(trace, back);
    }
}
