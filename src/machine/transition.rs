//! Transition types.

use crate::core::{Event, GuardExpr, State};
use crate::machine::error::HandlerError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Handler computing the next state synchronously.
pub type SyncHandler<S, E> = Arc<dyn Fn(&S, &E) -> S + Send + Sync>;

/// Handler computing the next state through a suspendable computation.
pub type AsyncHandler<S, E> =
    Arc<dyn Fn(S, E) -> BoxFuture<'static, Result<S, HandlerError>> + Send + Sync>;

/// Handler of an always-transition; always-rules see no event.
pub type AlwaysHandler<S> = Arc<dyn Fn(&S) -> S + Send + Sync>;

/// Maps `(state, event)` to the next state.
///
/// Handlers are pure with respect to the state value: side effects belong
/// in effect slots. Only `Sync` handlers can be replayed from a journal.
pub enum TransitionHandler<S, E> {
    Sync(SyncHandler<S, E>),
    Async(AsyncHandler<S, E>),
}

impl<S: State, E: Event> TransitionHandler<S, E> {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&S, &E) -> S + Send + Sync + 'static,
    {
        TransitionHandler::Sync(Arc::new(f))
    }

    pub fn suspending<F, Fut>(f: F) -> Self
    where
        F: Fn(S, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, HandlerError>> + Send + 'static,
    {
        TransitionHandler::Async(Arc::new(move |s, e| f(s, e).boxed()))
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, TransitionHandler::Sync(_))
    }

    /// Run the handler, converting a panic into `HandlerError::Panicked`.
    pub async fn run(&self, state: &S, event: &E) -> Result<S, HandlerError> {
        match self {
            TransitionHandler::Sync(f) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| f(state, event)))
                    .map_err(|payload| HandlerError::Panicked(panic_message(payload)))
            }
            TransitionHandler::Async(f) => {
                let f = Arc::clone(f);
                let (state, event) = (state.clone(), event.clone());
                AssertUnwindSafe(async move { f(state, event).await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload))))
            }
        }
    }

    /// Run the handler only if it can complete without suspending.
    pub fn run_sync(&self, state: &S, event: &E) -> Option<Result<S, HandlerError>> {
        match self {
            TransitionHandler::Sync(f) => Some(
                std::panic::catch_unwind(AssertUnwindSafe(|| f(state, event)))
                    .map_err(|payload| HandlerError::Panicked(panic_message(payload))),
            ),
            TransitionHandler::Async(_) => None,
        }
    }
}

impl<S, E> Clone for TransitionHandler<S, E> {
    fn clone(&self) -> Self {
        match self {
            TransitionHandler::Sync(f) => TransitionHandler::Sync(Arc::clone(f)),
            TransitionHandler::Async(f) => TransitionHandler::Async(Arc::clone(f)),
        }
    }
}

/// A transition out of `from` triggered by events tagged `event`.
///
/// When several transitions share `(from, event)` they are tried in
/// registration order and the first whose guard is absent or true wins.
pub struct Transition<S, E> {
    pub from: String,
    pub event: String,
    pub guard: Option<GuardExpr>,
    /// Re-run exit/enter effects even when the state tag does not change.
    pub reenter: bool,
    pub handler: TransitionHandler<S, E>,
}

impl<S: State, E: Event> Transition<S, E> {
    pub fn new(
        from: impl Into<String>,
        event: impl Into<String>,
        handler: TransitionHandler<S, E>,
    ) -> Self {
        Self {
            from: from.into(),
            event: event.into(),
            guard: None,
            reenter: false,
            handler,
        }
    }

    pub fn with_guard(mut self, guard: impl Into<GuardExpr>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn reentering(mut self) -> Self {
        self.reenter = true;
        self
    }
}

impl<S, E> Clone for Transition<S, E> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            event: self.event.clone(),
            guard: self.guard.clone(),
            reenter: self.reenter,
            handler: self.handler.clone(),
        }
    }
}

/// An eventless transition applied after every commit that changes the tag.
///
/// Always-transitions for one state form a guard cascade: the first entry
/// whose guard passes wins, and an unguarded entry is the catch-all.
pub struct AlwaysTransition<S> {
    pub from: String,
    pub guard: Option<GuardExpr>,
    pub handler: AlwaysHandler<S>,
}

impl<S: State> AlwaysTransition<S> {
    pub fn new<F>(from: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            guard: None,
            handler: Arc::new(handler),
        }
    }

    pub fn with_guard(mut self, guard: impl Into<GuardExpr>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn apply(&self, state: &S) -> Result<S, HandlerError> {
        std::panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(state)))
            .map_err(|payload| HandlerError::Panicked(panic_message(payload)))
    }
}

impl<S> Clone for AlwaysTransition<S> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            guard: self.guard.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
