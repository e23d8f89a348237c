//! Pure replay of event sequences through the transition engine.
//!
//! The simulator drives a [`Machine`] without an actor: no mailbox, no
//! effects, no persistence. It commits exactly what a live actor would
//! commit, which makes it the tool for checking machine definitions.

use crate::core::{Event, State, StateTrace};
use crate::machine::{Machine, DEFAULT_MAX_ALWAYS_ITERATIONS};
use tracing::{debug, trace};

/// Run `events` against a fresh instance of `machine` and return every
/// committed state, starting with the initial state.
///
/// Startup always-transitions are applied first. Events with no matching
/// transition are dropped, as are events whose handler fails. Once a final
/// state is reached the remaining events are ignored.
///
/// # Example
///
/// ```rust
/// use statecraft::machine::{IntoMachine, MachineDefinition};
/// use statecraft::simulate::simulate;
/// use statecraft::{event_enum, state_enum};
///
/// state_enum! {
///     enum Fetch {
///         Idle,
///         Loading,
///         Success { data: String },
///     }
/// }
///
/// event_enum! {
///     enum FetchEvent {
///         Fetch,
///         Resolve(String),
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let machine = MachineDefinition::new(Fetch::Idle)
///     .on("Idle", "Fetch", |_, _| Fetch::Loading)
///     .on("Loading", "Resolve", |_, e| match e {
///         FetchEvent::Resolve(data) => Fetch::Success { data: data.clone() },
///         _ => Fetch::Loading,
///     })
///     .final_state("Success")
///     .into_machine()
///     .unwrap();
///
/// let trace = simulate(&machine, vec![FetchEvent::Fetch, FetchEvent::Resolve("x".into())]).await;
/// assert_eq!(trace.tags(), vec!["Idle", "Loading", "Success"]);
/// assert_eq!(trace.last(), &Fetch::Success { data: "x".into() });
/// # }
/// ```
pub async fn simulate<S, E, I>(machine: &Machine<S, E>, events: I) -> StateTrace<S>
where
    S: State,
    E: Event,
    I: IntoIterator<Item = E>,
{
    simulate_with(machine, events, DEFAULT_MAX_ALWAYS_ITERATIONS).await
}

/// [`simulate`] with an explicit always-transition ceiling.
pub async fn simulate_with<S, E, I>(
    machine: &Machine<S, E>,
    events: I,
    max_always_iterations: usize,
) -> StateTrace<S>
where
    S: State,
    E: Event,
    I: IntoIterator<Item = E>,
{
    let mut trace = StateTrace::new(machine.initial_state().clone());
    let settled = machine
        .settle(machine.initial_state().clone(), max_always_iterations)
        .await;
    for step in settled.steps {
        trace.push(step);
    }
    let mut current = settled.state;

    for event in events {
        if machine.is_final(current.name()) {
            debug!(state = current.name(), "final state reached; remaining events ignored");
            break;
        }
        let step = match machine.transition(&current, &event).await {
            Ok(Some(step)) => step,
            Ok(None) => {
                trace!(state = current.name(), event = event.name(), "no transition");
                continue;
            }
            Err(e) => {
                debug!(state = current.name(), event = event.name(), error = %e, "handler failed");
                continue;
            }
        };

        let tag_changed = step.state.name() != current.name();
        current = step.state;
        trace.push(current.clone());
        if tag_changed {
            let settled = machine.settle(current, max_always_iterations).await;
            for state in settled.steps {
                trace.push(state);
            }
            current = settled.state;
        }
    }

    trace
}
