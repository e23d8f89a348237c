//! Commit hooks: observers called by the event loop itself.

use crate::core::{Event, State};
use async_trait::async_trait;

/// One processed event that changed the actor's state.
///
/// `state` is the value after the always-cascade the event triggered.
#[derive(Debug)]
pub struct Commit<'a, S, E> {
    pub actor_id: &'a str,
    pub previous: &'a S,
    pub state: &'a S,
    pub event: &'a E,
    /// Some exit/enter lifecycle ran while committing.
    pub lifecycle: bool,
}

/// Hook awaited by the event loop at startup, after each commit and at stop.
///
/// The loop does not read the next event until `on_commit` returns, so a
/// hook sees commits in order and never concurrently for one actor.
#[async_trait]
pub trait CommitHook<S: State, E: Event>: Send + Sync {
    async fn on_start(&self, _actor_id: &str, _state: &S) {}

    async fn on_commit(&self, commit: &Commit<'_, S, E>);

    async fn on_stop(&self, _actor_id: &str, _state: &S) {}
}
