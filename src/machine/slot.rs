//! Effect slots: named placeholders bound to handlers at provisioning time.

use crate::core::{Event, State};
use crate::runtime::{EffectContext, EffectError};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// How a slot is wired into a running actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    /// Predicate consulted by guard expressions.
    Guard,
    /// Task forked on state entry, interrupted on state exit.
    Invoke,
    /// Called on every entry into the state.
    OnEnter,
    /// Called on every exit from the state.
    OnExit,
    /// Task running for the whole actor lifetime.
    Background,
}

impl SlotKind {
    pub fn is_effect(self) -> bool {
        !matches!(self, SlotKind::Guard)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::Guard => "guard",
            SlotKind::Invoke => "invoke",
            SlotKind::OnEnter => "onEnter",
            SlotKind::OnExit => "onExit",
            SlotKind::Background => "background",
        };
        f.write_str(name)
    }
}

/// A placeholder registered by a machine definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSlot {
    pub kind: SlotKind,
    /// State the slot belongs to; `None` for background slots.
    pub state: Option<String>,
    /// Event tag for guard slots attached to an event transition.
    pub event: Option<String>,
    pub name: String,
}

/// Inputs handed to a guard predicate.
///
/// `event` is `None` when the guard belongs to an always-transition.
#[derive(Clone, Debug)]
pub struct GuardContext<S, E> {
    pub state: S,
    pub event: Option<E>,
}

pub type GuardHandler<S, E> =
    Arc<dyn Fn(GuardContext<S, E>) -> BoxFuture<'static, bool> + Send + Sync>;

pub type EffectHandler<S, E> =
    Arc<dyn Fn(EffectContext<S, E>) -> BoxFuture<'static, Result<(), EffectError>> + Send + Sync>;

pub enum SlotHandler<S, E> {
    Guard(GuardHandler<S, E>),
    Effect(EffectHandler<S, E>),
}

impl<S, E> SlotHandler<S, E> {
    pub(crate) fn accepts(&self, kind: SlotKind) -> bool {
        match self {
            SlotHandler::Guard(_) => kind == SlotKind::Guard,
            SlotHandler::Effect(_) => kind.is_effect(),
        }
    }

    pub(crate) fn kind_label(&self) -> SlotKind {
        match self {
            SlotHandler::Guard(_) => SlotKind::Guard,
            SlotHandler::Effect(_) => SlotKind::Invoke,
        }
    }
}

impl<S, E> Clone for SlotHandler<S, E> {
    fn clone(&self) -> Self {
        match self {
            SlotHandler::Guard(h) => SlotHandler::Guard(Arc::clone(h)),
            SlotHandler::Effect(h) => SlotHandler::Effect(Arc::clone(h)),
        }
    }
}

/// Handlers keyed by slot name, handed to `provide`.
///
/// # Example
///
/// ```rust
/// use statecraft::machine::SlotHandlers;
/// # use statecraft::core::{Event, State};
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// # enum Door { Closed }
/// # impl State for Door { fn name(&self) -> &str { "Closed" } }
/// # #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// # enum Knock { Knock }
/// # impl Event for Knock { fn name(&self) -> &str { "Knock" } }
///
/// let handlers = SlotHandlers::<Door, Knock>::new()
///     .guard("isFriendly", |_state, _event| true)
///     .effect("logEntry", |_ctx| async { Ok(()) });
///
/// assert_eq!(handlers.len(), 2);
/// ```
pub struct SlotHandlers<S, E> {
    handlers: HashMap<String, SlotHandler<S, E>>,
}

impl<S: State, E: Event> SlotHandlers<S, E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Bind a synchronous guard predicate.
    pub fn guard<F>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&S, Option<&E>) -> bool + Send + Sync + 'static,
    {
        let handler: GuardHandler<S, E> = Arc::new(move |ctx: GuardContext<S, E>| {
            let passed = predicate(&ctx.state, ctx.event.as_ref());
            futures::future::ready(passed).boxed()
        });
        self.insert(name, SlotHandler::Guard(handler))
    }

    /// Bind a guard whose decision may suspend.
    pub fn guard_async<F, Fut>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(GuardContext<S, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handler: GuardHandler<S, E> = Arc::new(move |ctx| predicate(ctx).boxed());
        self.insert(name, SlotHandler::Guard(handler))
    }

    /// Bind an effect used by invoke, onEnter, onExit or background slots.
    pub fn effect<F, Fut>(self, name: impl Into<String>, effect: F) -> Self
    where
        F: Fn(EffectContext<S, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        let handler: EffectHandler<S, E> = Arc::new(move |ctx| effect(ctx).boxed());
        self.insert(name, SlotHandler::Effect(handler))
    }

    fn insert(mut self, name: impl Into<String>, handler: SlotHandler<S, E>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SlotHandler<S, E>> {
        self.handlers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn into_inner(self) -> HashMap<String, SlotHandler<S, E>> {
        self.handlers
    }
}

impl<S: State, E: Event> Default for SlotHandlers<S, E> {
    fn default() -> Self {
        Self::new()
    }
}
