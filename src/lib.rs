//! Statecraft: typed state machines running as actors
//!
//! A machine is declared once as an immutable [`MachineDefinition`], its
//! named guard and effect slots are bound with [`provide`], and the
//! resulting [`Machine`] is run by an actor: one mailbox, one task, one
//! writer of the state.
//!
//! # Core Concepts
//!
//! - **State / Event**: tagged enums implementing [`State`] and [`Event`]
//! - **Transitions**: `(state tag, event tag)` lookups with guard cascades
//!   and eventless always-transitions
//! - **Slots**: named guards and effects bound before an actor can start
//! - **Scopes**: tasks and child actors started in a state are cancelled
//!   when the state is left
//! - **Persistence**: versioned snapshots and a journal, replayed on restore
//!
//! # Example
//!
//! ```rust
//! use statecraft::machine::{provide, MachineDefinition, SlotHandlers};
//! use statecraft::system::ActorSystem;
//! use statecraft::{event_enum, state_enum};
//!
//! state_enum! {
//!     enum Turnstile {
//!         Locked,
//!         Unlocked { coins: u32 },
//!     }
//! }
//!
//! event_enum! {
//!     enum Input {
//!         Coin,
//!         Push,
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let definition = MachineDefinition::new(Turnstile::Locked)
//!     .on("Locked", "Coin", |_, _| Turnstile::Unlocked { coins: 1 })
//!     .on("Unlocked", "Push", |_, _| Turnstile::Locked)
//!     .on_enter("Unlocked", "beep");
//!
//! let machine = provide(
//!     definition,
//!     SlotHandlers::new().effect("beep", |_ctx| async { Ok(()) }),
//! )
//! .unwrap();
//!
//! let system = ActorSystem::new();
//! let gate = system.spawn("gate", machine).await.unwrap();
//! gate.send(Input::Coin);
//! assert_eq!(gate.state().await, Turnstile::Unlocked { coins: 1 });
//! system.shutdown().await;
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod machine;
pub mod persistence;
pub mod runtime;
pub mod simulate;
pub mod system;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, TransitionBuilder};
pub use core::{Event, GuardExpr, State, StateTrace};
pub use machine::{provide, IntoMachine, Machine, MachineDefinition, SlotHandlers};
pub use runtime::{spawn, ActorConfig, ActorRef, EffectContext};
pub use simulate::simulate;
pub use system::ActorSystem;
