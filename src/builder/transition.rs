//! Builder for constructing transitions.

use crate::builder::error::BuildError;
use crate::core::{Event, GuardExpr, State};
use crate::machine::{HandlerError, Transition, TransitionHandler};
use std::future::Future;

/// Builder for constructing transitions with a fluent API.
pub struct TransitionBuilder<S, E> {
    from: Option<String>,
    event: Option<String>,
    guard: Option<GuardExpr>,
    reenter: bool,
    handler: Option<TransitionHandler<S, E>>,
}

impl<S: State, E: Event> TransitionBuilder<S, E> {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self {
            from: None,
            event: None,
            guard: None,
            reenter: false,
            handler: None,
        }
    }

    /// Set the source state tag (required).
    pub fn from(mut self, tag: impl Into<String>) -> Self {
        self.from = Some(tag.into());
        self
    }

    /// Set the triggering event tag (required).
    pub fn on(mut self, tag: impl Into<String>) -> Self {
        self.event = Some(tag.into());
        self
    }

    /// Add a guard expression (optional).
    pub fn guard(mut self, guard: impl Into<GuardExpr>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Run exit/enter effects even if the state tag does not change.
    pub fn reenter(mut self) -> Self {
        self.reenter = true;
        self
    }

    /// Always move to `target`, ignoring the event payload.
    pub fn to(self, target: S) -> Self {
        self.handle(move |_, _| target.clone())
    }

    /// Set a synchronous handler.
    pub fn handle<F>(mut self, handler: F) -> Self
    where
        F: Fn(&S, &E) -> S + Send + Sync + 'static,
    {
        self.handler = Some(TransitionHandler::sync(handler));
        self
    }

    /// Set a handler that may suspend. Such transitions are not replayable.
    pub fn handle_async<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(S, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, HandlerError>> + Send + 'static,
    {
        self.handler = Some(TransitionHandler::suspending(handler));
        self
    }

    /// Build the transition.
    pub fn build(self) -> Result<Transition<S, E>, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let event = self.event.ok_or(BuildError::MissingEvent)?;
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;

        let mut transition = Transition::new(from, event, handler);
        transition.guard = self.guard;
        transition.reenter = self.reenter;
        Ok(transition)
    }
}

impl<S: State, E: Event> Default for TransitionBuilder<S, E> {
    fn default() -> Self {
        Self::new()
    }
}
