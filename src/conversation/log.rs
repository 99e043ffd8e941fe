//! Append-only conversation history

use super::{Message, MessageError};
use std::ops::Deref;
use std::sync::Arc;

/// Ordered, append-only sequence of messages owned by one conversation.
///
/// Snapshots share storage with the log. An append made while a snapshot is
/// alive copies the backing vector first, so every snapshot keeps exactly the
/// state it was taken from.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Arc<Vec<Message>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> Result<(), MessageError> {
        message.validate()?;
        Arc::make_mut(&mut self.messages).push(message);
        Ok(())
    }

    /// Append a whole turn's output. Nothing is appended unless every
    /// message is valid.
    pub fn append_all(&mut self, messages: Vec<Message>) -> Result<(), MessageError> {
        for message in &messages {
            message.validate()?;
        }
        Arc::make_mut(&mut self.messages).extend(messages);
        Ok(())
    }

    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            messages: Arc::clone(&self.messages),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Immutable view of the log at one point in time
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    messages: Arc<Vec<Message>>,
}

impl LogSnapshot {
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.as_ref().clone()
    }
}

impl Deref for LogSnapshot {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.messages
    }
}

impl From<Vec<Message>> for LogSnapshot {
    fn from(messages: Vec<Message>) -> Self {
        Self {
            messages: Arc::new(messages),
        }
    }
}
