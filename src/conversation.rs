//! Conversation data model
//!
//! Messages are immutable once created; the log is append-only and hands out
//! cheap snapshots that never observe a half-applied append.

mod log;
mod message;

pub use log::{ConversationLog, LogSnapshot};
pub use message::{Message, MessageError, Role};
