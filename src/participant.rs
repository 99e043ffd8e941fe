//! Conversation participants
//!
//! A participant turns the current log into zero or more new messages. The
//! output is a lazy stream; the coordinator drains it completely before the
//! turn counts as done.

mod chat_agent;

pub use chat_agent::ChatAgent;

use crate::conversation::{LogSnapshot, Message};
pub use crate::error::ParticipantError;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Output of one participant invocation
pub type MessageStream<'a> = BoxStream<'a, Result<Message, ParticipantError>>;

pub trait Participant: Send + Sync {
    /// Unique name within a conversation; also the author of its messages
    fn name(&self) -> &str;

    /// Start a fresh external interaction over the given log.
    ///
    /// `cancel` fires when the caller abandons the turn; long-running work
    /// (tool calls, timers) should stop promptly.
    fn produce(&self, log: LogSnapshot, cancel: CancellationToken) -> MessageStream<'_>;
}

impl<T: Participant + ?Sized> Participant for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn produce(&self, log: LogSnapshot, cancel: CancellationToken) -> MessageStream<'_> {
        (**self).produce(log, cancel)
    }
}

impl<T: Participant + ?Sized> Participant for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn produce(&self, log: LogSnapshot, cancel: CancellationToken) -> MessageStream<'_> {
        (**self).produce(log, cancel)
    }
}
