//! Errors surfaced by the actor runtime.

use crate::machine::ProvideError;
use thiserror::Error;

/// An actor could not be started.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpawnError {
    #[error("Actor id '{0}' is already registered")]
    DuplicateId(String),

    #[error(transparent)]
    Provide(#[from] ProvideError),

    #[error("Cannot spawn child '{id}': the owning state scope is already closed")]
    ScopeClosed { id: String },
}

/// An operation on a running actor failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActorError {
    #[error("Actor '{id}' has stopped; its mailbox is closed")]
    Stopped { id: String },
}

/// Failure reported by an effect handler.
///
/// Effect failures are logged and never stop the actor.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EffectError {
    #[error("Effect failed: {0}")]
    Failed(String),

    #[error("Effect panicked: {0}")]
    Panicked(String),
}

impl EffectError {
    pub fn msg(message: impl std::fmt::Display) -> Self {
        EffectError::Failed(message.to_string())
    }
}

impl From<SpawnError> for EffectError {
    fn from(error: SpawnError) -> Self {
        EffectError::Failed(error.to_string())
    }
}
