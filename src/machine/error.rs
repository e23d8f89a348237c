//! Errors raised while provisioning and executing machine definitions.

use crate::machine::slot::SlotKind;
use thiserror::Error;

/// Failure of a single transition handler invocation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandlerError {
    #[error("Transition handler failed: {0}")]
    Failed(String),

    #[error("Transition handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn msg(message: impl std::fmt::Display) -> Self {
        HandlerError::Failed(message.to_string())
    }
}

/// A single problem found while binding handlers to slots.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SlotError {
    #[error("No handler provided for {kind} slot '{name}'")]
    Missing { name: String, kind: SlotKind },

    #[error("Handler '{name}' does not match any registered slot")]
    Unknown { name: String },

    #[error("Slot '{name}' is a {expected} slot but was given a {found} handler")]
    KindMismatch {
        name: String,
        expected: SlotKind,
        found: SlotKind,
    },
}

/// Provisioning failed; carries every slot error found, never a partial machine.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Effect slot provisioning failed: {summary}")]
pub struct ProvideError {
    pub errors: Vec<SlotError>,
    summary: String,
}

impl ProvideError {
    pub(crate) fn new(errors: Vec<SlotError>) -> Self {
        let summary = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self { errors, summary }
    }

    /// Names of slots that had no handler.
    pub fn missing(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter_map(|e| match e {
                SlotError::Missing { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Handler keys that matched no slot.
    pub fn unknown(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter_map(|e| match e {
                SlotError::Unknown { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Replay of a journaled event could not be applied.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReplayError {
    #[error("Transition '{state}' --{event}--> uses an asynchronous handler and cannot be replayed")]
    AsyncHandler { state: String, event: String },

    #[error("Replayed handler failed for '{state}' --{event}-->: {source}")]
    Handler {
        state: String,
        event: String,
        #[source]
        source: HandlerError,
    },
}
