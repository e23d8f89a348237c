//! Build errors for machine and transition builders.

use thiserror::Error;

/// Errors that can occur when building machine definitions and transitions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("No transitions defined. Add at least one transition or always-transition")]
    NoTransitions,

    #[error("Transition source state not specified. Call .from(tag)")]
    MissingFromState,

    #[error("Transition event not specified. Call .on(tag)")]
    MissingEvent,

    #[error("Transition handler not specified. Call .to(state), .handle(f) or .handle_async(f)")]
    MissingHandler,

    #[error("Always-transition {position} of '{state}' follows an unguarded one and can never run")]
    UnreachableAlways { state: String, position: usize },
}
