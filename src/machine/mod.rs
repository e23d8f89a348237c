//! Machine definitions, slot provisioning and the transition engine.
//!
//! A [`MachineDefinition`] declares transitions, always-rules and effect
//! registrations. [`provide`] binds every slot to a handler and yields a
//! [`Machine`], the only form an actor can run.

mod definition;
mod error;
mod index;
mod resolved;
mod slot;
mod transition;

pub use definition::{EffectRegistration, MachineDefinition};
pub use error::{HandlerError, ProvideError, ReplayError, SlotError};
pub use index::TransitionIndex;
pub use resolved::{provide, Machine, Settled, Step, DEFAULT_MAX_ALWAYS_ITERATIONS};
pub use slot::{
    EffectHandler, EffectSlot, GuardContext, GuardHandler, SlotHandler, SlotHandlers, SlotKind,
};
pub use transition::{
    AlwaysHandler, AlwaysTransition, AsyncHandler, SyncHandler, Transition, TransitionHandler,
};

pub(crate) use transition::panic_message;

use crate::core::{Event, State};

/// Anything that can be turned into a runnable machine.
///
/// Implemented for provisioned machines and for definitions that register
/// no slots, so slot-free machines can be spawned without calling `provide`.
pub trait IntoMachine<S: State, E: Event> {
    fn into_machine(self) -> Result<Machine<S, E>, ProvideError>;
}

impl<S: State, E: Event> IntoMachine<S, E> for Machine<S, E> {
    fn into_machine(self) -> Result<Machine<S, E>, ProvideError> {
        Ok(self)
    }
}

impl<S: State, E: Event> IntoMachine<S, E> for MachineDefinition<S, E> {
    fn into_machine(self) -> Result<Machine<S, E>, ProvideError> {
        Machine::from_definition(self)
    }
}
