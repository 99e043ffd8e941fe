//! Effects produced by state transitions

use crate::conversation::Message;

/// Work the runtime performs after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Run the participant at this index and drain its output
    Invoke { participant: usize },

    /// Abandon the in-flight invocation, discarding partial output
    AbortInvocation,

    /// Append the drained output to the log, in order
    Append {
        participant: usize,
        messages: Vec<Message>,
    },

    /// Ask the termination policy for a verdict
    Evaluate { speaker: usize, candidate: usize },

    /// Conversation is over
    Finish,
}
