//! Actor handles.

use crate::core::{Event, State};
use crate::machine::{IntoMachine, Machine};
use crate::runtime::config::ActorConfig;
use crate::runtime::error::{ActorError, SpawnError};
use crate::runtime::event_loop::EventLoop;
use crate::runtime::hook::CommitHook;
use crate::runtime::inspector::Inspector;
use crate::runtime::scope::Scope;
use crate::system::WeakSystem;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorStatus {
    Starting,
    Running,
    Stopped,
}

pub(crate) enum Envelope<S, E> {
    Event(E),
    Query(oneshot::Sender<S>),
}

/// Settings an actor passes down to the children it spawns.
#[derive(Clone, Default)]
pub(crate) struct RuntimeContext {
    pub(crate) config: ActorConfig,
    pub(crate) inspector: Option<Arc<dyn Inspector>>,
    pub(crate) system: Option<WeakSystem>,
}

pub(crate) struct ActorShared<S, E> {
    pub(crate) id: String,
    pub(crate) parent: Option<String>,
    pub(crate) machine: Machine<S, E>,
    pub(crate) context: RuntimeContext,
    mailbox: mpsc::UnboundedSender<Envelope<S, E>>,
    cell: RwLock<S>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<S>>>,
    status: watch::Sender<ActorStatus>,
    stop: watch::Sender<bool>,
}

/// Handle to a running actor. Clones address the same actor.
pub struct ActorRef<S, E> {
    inner: Arc<ActorShared<S, E>>,
}

impl<S, E> Clone for ActorRef<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Channels<S, E> {
    pub(crate) mailbox: mpsc::UnboundedReceiver<Envelope<S, E>>,
    pub(crate) stop: watch::Receiver<bool>,
}

impl<S: State, E: Event> ActorRef<S, E> {
    pub(crate) fn create(
        id: String,
        parent: Option<String>,
        machine: Machine<S, E>,
        context: RuntimeContext,
        initial: S,
    ) -> (Self, Channels<S, E>) {
        let (mailbox, mailbox_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ActorStatus::Starting);
        let (stop, stop_rx) = watch::channel(false);
        let actor = Self {
            inner: Arc::new(ActorShared {
                id,
                parent,
                machine,
                context,
                mailbox,
                cell: RwLock::new(initial),
                subscribers: Mutex::new(Vec::new()),
                status,
                stop,
            }),
        };
        let channels = Channels {
            mailbox: mailbox_rx,
            stop: stop_rx,
        };
        (actor, channels)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Id of the actor whose effect spawned this one.
    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent.as_deref()
    }

    pub fn machine(&self) -> &Machine<S, E> {
        &self.inner.machine
    }

    pub(crate) fn context(&self) -> &RuntimeContext {
        &self.inner.context
    }

    /// Enqueue an event. Events sent to a stopped actor are dropped.
    pub fn send(&self, event: E) {
        if let Err(error) = self.try_send(event) {
            trace!(actor_id = %self.inner.id, %error, "event dropped");
        }
    }

    pub fn try_send(&self, event: E) -> Result<(), ActorError> {
        self.inner
            .mailbox
            .send(Envelope::Event(event))
            .map_err(|_| ActorError::Stopped {
                id: self.inner.id.clone(),
            })
    }

    /// The last committed state, read without waiting.
    pub fn snapshot(&self) -> S {
        self.inner.cell.read().clone()
    }

    /// The state after every event sent before this call is processed.
    ///
    /// A stopped actor answers with its final state.
    pub async fn state(&self) -> S {
        let (reply, answer) = oneshot::channel();
        if self.inner.mailbox.send(Envelope::Query(reply)).is_err() {
            return self.snapshot();
        }
        match answer.await {
            Ok(state) => state,
            Err(_) => self.snapshot(),
        }
    }

    /// Whether the current state carries `tag`.
    pub fn matches(&self, tag: &str) -> bool {
        self.inner.cell.read().name() == tag
    }

    /// Whether `event` would be accepted in the current state, guards included.
    pub async fn can(&self, event: &E) -> bool {
        let state = self.snapshot();
        self.inner.machine.pick_transition(&state, event).await.is_some()
    }

    /// Whether any transition for `event` leaves the current state,
    /// without evaluating guards.
    pub fn has_transition(&self, event: &E) -> bool {
        let state = self.inner.cell.read();
        !self
            .inner
            .machine
            .index()
            .transitions(state.name(), event.name())
            .is_empty()
    }

    /// Stream of every state committed from now on, in commit order.
    ///
    /// The stream ends when the actor stops.
    pub fn subscribe(&self) -> Subscription<S> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut subscribers = self.inner.subscribers.lock();
        if *self.inner.status.borrow() != ActorStatus::Stopped {
            subscribers.push(sender);
        }
        Subscription { receiver }
    }

    /// Wait until the state satisfies `predicate`.
    ///
    /// Returns `None` if the actor stops first.
    pub async fn wait_for<F>(&self, predicate: F) -> Option<S>
    where
        F: Fn(&S) -> bool,
    {
        let mut subscription = self.subscribe();
        let current = self.snapshot();
        if predicate(&current) {
            return Some(current);
        }
        while let Some(state) = subscription.recv().await {
            if predicate(&state) {
                return Some(state);
            }
        }
        None
    }

    pub fn status(&self) -> ActorStatus {
        *self.inner.status.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == ActorStatus::Stopped
    }

    /// Signal the actor to stop without waiting for teardown.
    pub fn request_stop(&self) {
        self.inner.stop.send_replace(true);
    }

    /// Stop the actor and wait until teardown has finished.
    ///
    /// Safe to call any number of times, concurrently or after the actor
    /// stopped on its own.
    pub async fn stop(&self) {
        self.request_stop();
        self.wait_status(|status| status == ActorStatus::Stopped).await;
    }

    /// Wait until startup has finished.
    pub(crate) async fn ready(&self) {
        self.wait_status(|status| status != ActorStatus::Starting).await;
    }

    async fn wait_status(&self, predicate: impl Fn(ActorStatus) -> bool) {
        let mut status = self.inner.status.subscribe();
        let _ = status.wait_for(|s| predicate(*s)).await;
    }

    pub(crate) fn publish(&self, state: &S) {
        *self.inner.cell.write() = state.clone();
        self.inner
            .subscribers
            .lock()
            .retain(|subscriber| subscriber.send(state.clone()).is_ok());
    }

    pub(crate) fn set_status(&self, status: ActorStatus) {
        self.inner.status.send_replace(status);
    }

    /// Mark the actor stopped and end every subscription.
    pub(crate) fn finish(&self) {
        let mut subscribers = self.inner.subscribers.lock();
        self.inner.status.send_replace(ActorStatus::Stopped);
        subscribers.clear();
    }
}

impl<S: State, E: Event> fmt::Debug for ActorRef<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .field("state", &self.snapshot())
            .finish()
    }
}

/// Committed states of one actor.
pub struct Subscription<S> {
    receiver: mpsc::UnboundedReceiver<S>,
}

impl<S> Subscription<S> {
    pub async fn recv(&mut self) -> Option<S> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<S> {
        self.receiver.try_recv().ok()
    }
}

impl<S> Stream for Subscription<S> {
    type Item = S;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        self.receiver.poll_recv(cx)
    }
}

/// Type-erased view of an actor, as held by registries and scopes.
pub trait ErasedActor: Send + Sync {
    fn id(&self) -> &str;
    fn parent_id(&self) -> Option<&str>;
    fn state_tag(&self) -> String;
    fn is_stopped(&self) -> bool;
    fn request_stop(&self);
    fn stop_boxed(&self) -> BoxFuture<'_, ()>;
    fn as_any(&self) -> &dyn Any;
}

impl<S: State, E: Event> ErasedActor for ActorRef<S, E> {
    fn id(&self) -> &str {
        ActorRef::id(self)
    }

    fn parent_id(&self) -> Option<&str> {
        ActorRef::parent_id(self)
    }

    fn state_tag(&self) -> String {
        self.inner.cell.read().name().to_string()
    }

    fn is_stopped(&self) -> bool {
        ActorRef::is_stopped(self)
    }

    fn request_stop(&self) {
        ActorRef::request_stop(self)
    }

    fn stop_boxed(&self) -> BoxFuture<'_, ()> {
        self.stop().boxed()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Everything needed to bring one actor up.
pub(crate) struct Launch<S, E> {
    pub(crate) id: String,
    pub(crate) machine: Machine<S, E>,
    pub(crate) context: RuntimeContext,
    pub(crate) parent: Option<String>,
    pub(crate) hook: Option<Arc<dyn CommitHook<S, E>>>,
    pub(crate) initial: Option<S>,
}

impl<S: State, E: Event> Launch<S, E> {
    pub(crate) fn new(id: String, machine: Machine<S, E>, context: RuntimeContext) -> Self {
        Self {
            id,
            machine,
            context,
            parent: None,
            hook: None,
            initial: None,
        }
    }

    pub(crate) fn with_parent(mut self, parent: String) -> Self {
        self.parent = Some(parent);
        self
    }

    pub(crate) fn with_hook(mut self, hook: Arc<dyn CommitHook<S, E>>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub(crate) fn with_initial(mut self, initial: S) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Register, start the event loop and wait for startup to finish.
    pub(crate) async fn start(self, scope: Option<&Scope>) -> Result<ActorRef<S, E>, SpawnError> {
        let system = self.context.system.as_ref().and_then(WeakSystem::upgrade);
        let (actor, event_loop) = EventLoop::prepare(self);
        let erased: Arc<dyn ErasedActor> = Arc::new(actor.clone());

        if let Some(system) = &system {
            system.register(Arc::clone(&erased))?;
        }
        if let Some(scope) = scope {
            if scope.adopt(erased).is_err() {
                if let Some(system) = &system {
                    system.forget(actor.id());
                }
                return Err(SpawnError::ScopeClosed {
                    id: actor.id().to_string(),
                });
            }
        }
        if let Some(system) = &system {
            system.announce_spawned(actor.id(), actor.parent_id());
        }

        event_loop.spawn();
        actor.ready().await;
        Ok(actor)
    }
}

/// Spawn an actor outside any actor system.
///
/// # Example
///
/// ```rust
/// use statecraft::machine::MachineDefinition;
/// use statecraft::runtime::spawn;
/// use statecraft::{event_enum, state_enum};
///
/// state_enum! {
///     pub enum Light {
///         Off,
///         On,
///     }
/// }
///
/// event_enum! {
///     pub enum Switch {
///         Toggle,
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let light = spawn(
///     "hall",
///     MachineDefinition::new(Light::Off)
///         .on("Off", "Toggle", |_, _| Light::On)
///         .on("On", "Toggle", |_, _| Light::Off),
/// )
/// .await
/// .unwrap();
///
/// light.send(Switch::Toggle);
/// assert_eq!(light.state().await, Light::On);
/// light.stop().await;
/// # }
/// ```
pub async fn spawn<S, E>(
    id: impl Into<String>,
    machine: impl IntoMachine<S, E>,
) -> Result<ActorRef<S, E>, SpawnError>
where
    S: State,
    E: Event,
{
    spawn_with_config(id, machine, ActorConfig::default()).await
}

pub async fn spawn_with_config<S, E>(
    id: impl Into<String>,
    machine: impl IntoMachine<S, E>,
    config: ActorConfig,
) -> Result<ActorRef<S, E>, SpawnError>
where
    S: State,
    E: Event,
{
    let context = RuntimeContext {
        config,
        ..RuntimeContext::default()
    };
    Launch::new(id.into(), machine.into_machine()?, context)
        .start(None)
        .await
}
