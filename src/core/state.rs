//! Core traits for state and event values.
//!
//! States and events are discriminated values: each one carries a tag
//! (returned by `name`) that the transition engine uses as its lookup key.
//! Everything else about the value is opaque to the runtime.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for state machine states.
///
/// A state value is immutable and replaced wholesale on every transition.
/// The tag returned by `name` selects which transitions, always-rules and
/// effects apply; the remaining fields are data carried by the state.
///
/// # Required Traits
///
/// - `Clone`: states are published to observers and snapshotted
/// - `PartialEq`: restored states are compared against live ones
/// - `Debug`: states appear in diagnostics
/// - `Serialize` + `Deserialize`: states are persisted through a codec
///
/// # Example
///
/// ```rust
/// use statecraft::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum FetchState {
///     Idle,
///     Loading,
///     Success { data: String },
/// }
///
/// impl State for FetchState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "Idle",
///             Self::Loading => "Loading",
///             Self::Success { .. } => "Success",
///         }
///     }
/// }
///
/// let state = FetchState::Success { data: "x".into() };
/// assert_eq!(state.name(), "Success");
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// The discriminating tag of this state.
    fn name(&self) -> &str;
}

/// Trait for events consumed by an actor's mailbox.
///
/// Events are never mutated. Each one is consumed by exactly one mailbox
/// read and, for persistent actors, journaled through a codec.
pub trait Event:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// The discriminating tag of this event.
    fn name(&self) -> &str;
}
