//! A single utterance in a conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Who a message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a message is refused by the log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("agent message has no author")]
    MissingAuthor,
    #[error("author must not be blank")]
    BlankAuthor,
}

/// One utterance. Position in the conversation is implied by log order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, author: Option<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            author,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, None, content)
    }

    pub fn agent(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Agent, Some(author.into()), content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, None, content)
    }

    /// Check the message can be appended to a log.
    ///
    /// Agent messages must name the participant that produced them; any
    /// author that is given must be non-blank. Content may be empty.
    pub fn validate(&self) -> Result<(), MessageError> {
        match (&self.author, self.role) {
            (Some(author), _) if author.trim().is_empty() => Err(MessageError::BlankAuthor),
            (None, Role::Agent) => Err(MessageError::MissingAuthor),
            _ => Ok(()),
        }
    }

    pub fn is_from(&self, name: &str) -> bool {
        self.author.as_deref() == Some(name)
    }

    /// Case-insensitive substring test on the content
    pub fn mentions(&self, marker: &str) -> bool {
        self.content.to_lowercase().contains(&marker.to_lowercase())
    }
}
