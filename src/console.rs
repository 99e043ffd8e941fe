//! Terminal collaborator
//!
//! The human side of a conversation: a participant that reads lines from an
//! async source, plus formatting for printing messages.

use crate::conversation::{LogSnapshot, Message, Role};
use crate::participant::{MessageStream, Participant, ParticipantError};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;

/// Line that ends an interactive session
pub const EXIT_COMMAND: &str = "exit";

const USER_PROMPT: &str = "User: ";

/// Output shared between the prompt and whoever prints the conversation
pub type SharedWriter<W> = Arc<Mutex<W>>;

/// Participant backed by a line-oriented input source.
///
/// Typing `exit` (or closing the input) yields no message and cancels the
/// conversation through the token handed in at construction.
pub struct ConsoleUser<R, W = Stdout> {
    name: String,
    lines: Mutex<LinesStream<R>>,
    cancel: CancellationToken,
    prompt: Option<SharedWriter<W>>,
}

impl<R> ConsoleUser<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Reads without prompting; see [`ConsoleUser::prompt_to`]
    pub fn new(reader: R, cancel: CancellationToken) -> Self {
        Self {
            name: "User".to_string(),
            lines: Mutex::new(LinesStream::new(reader.lines())),
            cancel,
            prompt: None,
        }
    }
}

impl<R, W> ConsoleUser<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Write `User: ` to `sink` before every read
    pub fn prompt_to<S>(self, sink: SharedWriter<S>) -> ConsoleUser<R, S> {
        ConsoleUser {
            name: self.name,
            lines: self.lines,
            cancel: self.cancel,
            prompt: Some(sink),
        }
    }

    async fn read_turn(&self) -> Result<Option<Message>, ParticipantError> {
        let mut lines = self.lines.lock().await;
        loop {
            if let Some(sink) = &self.prompt {
                let mut sink = sink.lock().await;
                sink.write_all(USER_PROMPT.as_bytes()).await?;
                sink.flush().await?;
            }

            let Some(line) = lines.next().await.transpose()? else {
                tracing::debug!(participant = %self.name, "Input closed");
                self.cancel.cancel();
                return Ok(None);
            };

            let line = line.trim();
            if line == EXIT_COMMAND {
                self.cancel.cancel();
                return Ok(None);
            }
            if !line.is_empty() {
                return Ok(Some(Message::user(line)));
            }
        }
    }
}

impl<R, W> Participant for ConsoleUser<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, _log: LogSnapshot, _cancel: CancellationToken) -> MessageStream<'_> {
        stream::once(self.read_turn())
            .filter_map(|turn| async move { turn.transpose() })
            .boxed()
    }
}

/// How messages are rendered on the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayStyle {
    /// `# {role}: {content}`
    #[default]
    Plain,
    /// Agents by name, system notes tagged, user input not echoed
    Chat,
    /// `# {role} - {author}: {content}`
    Transcript,
}

/// Render a message, or `None` if this style hides it
pub fn format_message(style: DisplayStyle, message: &Message) -> Option<String> {
    let role = message.role;
    let content = &message.content;
    match style {
        DisplayStyle::Plain => Some(format!("# {role}: {content}")),
        DisplayStyle::Chat => match (role, message.author.as_deref()) {
            (Role::User, _) => None,
            (Role::Agent, Some(author)) => Some(format!("{author}: {content}")),
            (_, Some(author)) => Some(format!("# {role}: ({author}) {content}")),
            (_, None) => Some(format!("# {role}: {content}")),
        },
        DisplayStyle::Transcript => {
            let author = message.author.as_deref().unwrap_or("*");
            Some(format!("# {role} - {author}: {content}"))
        }
    }
}
