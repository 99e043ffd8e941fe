//! Conversation-level error types

use crate::conversation::MessageError;
use crate::llm::LlmError;
use crate::state_machine::TransitionError;
use crate::termination::PolicyError;
use thiserror::Error;

/// Failure raised by a participant while producing its output
#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error(transparent)]
    Backend(#[from] LlmError),
    #[error("participant timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the coordinator to its caller.
///
/// Whenever one of these is returned the log stays frozen at the last
/// successful append.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("participant '{participant}' failed: {source}")]
    ParticipantFailure {
        participant: String,
        #[source]
        source: ParticipantError,
    },
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] MessageError),
    #[error("termination policy failed: {0}")]
    Policy(#[from] PolicyError),
    #[error("conversation was cancelled")]
    Cancelled,
    #[error("conversation has already terminated")]
    AlreadyTerminated,
    #[error("a conversation needs at least one participant")]
    NoParticipants,
    #[error("participant name '{0}' is used more than once")]
    DuplicateParticipant(String),
    #[error("coordinator received an out-of-order event: {0}")]
    InvalidTransition(String),
}

impl From<TransitionError> for ConversationError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::AlreadyTerminated => ConversationError::AlreadyTerminated,
            TransitionError::NoParticipants => ConversationError::NoParticipants,
            TransitionError::InvalidTransition(msg) => ConversationError::InvalidTransition(msg),
        }
    }
}
