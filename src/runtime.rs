//! Runtime for executing conversations
//!
//! Each [`Coordinator`] exclusively owns its log; independent conversations
//! share no mutable state and can run on separate tasks.

mod coordinator;

#[cfg(test)]
pub mod testing;

pub use coordinator::{Coordinator, CoordinatorBuilder, TurnOutcome};
