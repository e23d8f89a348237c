//! Builder API for ergonomic machine construction.
//!
//! The builders validate what [`MachineDefinition`](crate::machine::MachineDefinition)'s
//! own chain accepts unchecked, and the macros declare tagged state and
//! event enums.
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{MachineBuilder, TransitionBuilder};
//! use statecraft::{event_enum, state_enum};
//!
//! state_enum! {
//!     enum Door {
//!         Closed,
//!         Open,
//!         Locked,
//!     }
//! }
//!
//! event_enum! {
//!     enum DoorEvent {
//!         Open,
//!         Close,
//!         Lock,
//!     }
//! }
//!
//! let definition = MachineBuilder::<Door, DoorEvent>::new()
//!     .initial(Door::Closed)
//!     .transition(TransitionBuilder::new().from("Closed").on("Open").to(Door::Open))?
//!     .transition(TransitionBuilder::new().from("Open").on("Close").to(Door::Closed))?
//!     .transition(
//!         TransitionBuilder::new()
//!             .from("Closed")
//!             .on("Lock")
//!             .guard("has_key")
//!             .to(Door::Locked),
//!     )?
//!     .build()?;
//!
//! assert_eq!(definition.transitions().len(), 3);
//! assert!(definition.has_slot("has_key"));
//! # Ok::<(), statecraft::builder::BuildError>(())
//! ```

mod error;
mod machine;
pub mod macros;
mod transition;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use transition::TransitionBuilder;

use crate::core::{Event, GuardExpr, State};
use crate::machine::{Transition, TransitionHandler};

/// A transition that always moves to `to`.
pub fn simple_transition<S: State, E: Event>(
    from: impl Into<String>,
    event: impl Into<String>,
    to: S,
) -> Transition<S, E> {
    Transition::new(from, event, TransitionHandler::sync(move |_, _| to.clone()))
}

/// A transition to `to` that only fires when `guard` passes.
pub fn guarded_transition<S: State, E: Event>(
    from: impl Into<String>,
    event: impl Into<String>,
    guard: impl Into<GuardExpr>,
    to: S,
) -> Transition<S, E> {
    simple_transition(from, event, to).with_guard(guard)
}
