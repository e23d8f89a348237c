//! Actor systems: registries of named actors and their lifecycle bus.

mod actor_system;
mod bus;

pub use actor_system::{ActorSystem, ActorSystemBuilder};
pub use bus::{EventBus, SubscriberId, SystemEvent};

pub(crate) use actor_system::WeakSystem;
