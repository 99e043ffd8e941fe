//! Console demos hosted by the `agent-chat` binary
//!
//! Each demo takes its backend and input source as arguments so the flows can
//! be exercised against test doubles.

pub mod ask;
pub mod basic_chat;
pub mod blog_post;
pub mod minion;

use crate::error::{ConversationError, ParticipantError};
use crate::llm::LlmError;
use thiserror::Error;

/// Farewell printed when the user leaves an interactive demo
pub const FAREWELL: &str = "Banana!!";

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error(transparent)]
    Participant(#[from] ParticipantError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("console I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
