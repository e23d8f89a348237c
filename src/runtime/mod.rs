//! The actor runtime: mailboxes, event loops, scopes and effects.

mod actor;
mod config;
mod effect;
mod error;
mod event_loop;
mod hook;
mod inspector;
mod scope;

pub use actor::{spawn, spawn_with_config, ActorRef, ActorStatus, ErasedActor, Subscription};
pub use config::ActorConfig;
pub use effect::{EffectContext, EffectTrigger};
pub use error::{ActorError, EffectError, SpawnError};
pub use hook::{Commit, CommitHook};
pub use inspector::{Inspection, Inspector, RecordingInspector, TracingInspector};
pub use scope::Scope;

pub(crate) use actor::{Launch, RuntimeContext};
