//! Core state machine types.
//!
//! This module contains the pure vocabulary of the machine:
//! - State and event values via the `State` and `Event` traits
//! - Guard expressions over named slots
//! - Immutable state traces
//!
//! Nothing in this module spawns tasks or touches storage.

mod guard;
mod state;
mod trace;

pub use guard::GuardExpr;
pub use state::{Event, State};
pub use trace::StateTrace;
