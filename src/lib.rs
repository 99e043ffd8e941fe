//! Multi-agent turn-taking over a shared conversation log
//!
//! A [`runtime::Coordinator`] invokes [`participant::Participant`]s in strict
//! round robin, appends what they say to an append-only
//! [`conversation::ConversationLog`] and asks a
//! [`termination::TerminationPolicy`] after every turn whether to stop.
//! Model-backed participants talk to a chat-completion backend ([`llm`]) and
//! may call [`tools`] privately while producing a turn.

pub mod console;
pub mod conversation;
pub mod demos;
pub mod error;
pub mod llm;
pub mod participant;
pub mod runtime;
pub mod state_machine;
pub mod termination;
pub mod tools;

pub use conversation::{ConversationLog, LogSnapshot, Message, Role};
pub use error::{ConversationError, ParticipantError};
pub use runtime::{Coordinator, TurnOutcome};
pub use state_machine::StopReason;
