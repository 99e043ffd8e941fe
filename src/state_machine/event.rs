//! Events that drive the coordinator

use crate::conversation::{Message, MessageError};
use crate::termination::{PolicyError, Verdict};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Begin the next turn
    Select,

    // Invocation events
    /// The participant's stream finished without error
    OutputDrained { messages: Vec<Message> },
    ParticipantFailed { message: String },

    // Append events
    Appended { count: usize },
    AppendRejected { error: MessageError },

    // Evaluation events
    Verdict { verdict: Verdict },
    PolicyFailed { error: PolicyError },

    /// Caller cancelled the conversation
    Cancel,
}
