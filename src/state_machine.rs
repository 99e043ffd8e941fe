//! Turn-taking state machine
//!
//! Elm-style: `transition` is pure and returns the effects the runtime must
//! perform. Round-robin selection, append ordering and termination all live
//! here; suspension and I/O live in [`crate::runtime`].

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{CoordContext, CoordState, StopReason};
pub use transition::{transition, TransitionError, TransitionResult};
