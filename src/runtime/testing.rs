//! Mock implementations for testing
//!
//! These mocks enable testing participants and the coordinator without real
//! I/O.

use crate::conversation::{LogSnapshot, Message};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::participant::{MessageStream, Participant, ParticipantError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock model backend that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    delay: Option<Duration>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering (for timeout and cancellation tests)
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::transport("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Scripted Participant
// ============================================================================

enum Script {
    /// One entry per turn; an exhausted script produces nothing
    Turns(Mutex<VecDeque<Vec<Message>>>),
    /// Same reply every turn
    Repeat(String),
}

/// Participant that replays canned output and records the log it saw
pub struct ScriptedParticipant {
    name: String,
    script: Script,
    /// Log length observed on each invocation
    pub seen: Mutex<Vec<usize>>,
}

impl ScriptedParticipant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Script::Turns(Mutex::new(VecDeque::new())),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// One agent message per turn
    #[must_use]
    pub fn replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let turns = replies.into_iter().map(|r| vec![r.into()]).collect::<Vec<_>>();
        self.turns(turns)
    }

    /// Any number of agent messages per turn
    #[must_use]
    pub fn turns<I, T, S>(mut self, turns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = self.name.clone();
        let turns = turns
            .into_iter()
            .map(|turn| {
                turn.into_iter()
                    .map(|content| Message::agent(name.clone(), content))
                    .collect()
            })
            .collect();
        self.script = Script::Turns(Mutex::new(turns));
        self
    }

    /// A single turn producing exactly these messages, unvalidated
    #[must_use]
    pub fn raw(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.script = Script::Turns(Mutex::new(VecDeque::from([messages
            .into_iter()
            .collect::<Vec<_>>()])));
        self
    }

    #[must_use]
    pub fn repeating(mut self, reply: impl Into<String>) -> Self {
        self.script = Script::Repeat(reply.into());
        self
    }
}

impl Participant for ScriptedParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, log: LogSnapshot, _cancel: CancellationToken) -> MessageStream<'_> {
        self.seen.lock().unwrap().push(log.len());
        let messages = match &self.script {
            Script::Turns(turns) => turns.lock().unwrap().pop_front().unwrap_or_default(),
            Script::Repeat(reply) => vec![Message::agent(self.name.clone(), reply.clone())],
        };
        stream::iter(messages.into_iter().map(Ok)).boxed()
    }
}

// ============================================================================
// Failing Participant
// ============================================================================

/// Participant whose backend fails, optionally after some partial output
pub struct FailingParticipant {
    name: String,
    error: String,
    partial: Vec<String>,
}

impl FailingParticipant {
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            partial: Vec::new(),
        }
    }

    #[must_use]
    pub fn after<I, S>(mut self, partial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partial = partial.into_iter().map(Into::into).collect();
        self
    }
}

impl Participant for FailingParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, _log: LogSnapshot, _cancel: CancellationToken) -> MessageStream<'_> {
        let partial = self
            .partial
            .iter()
            .map(|content| Ok(Message::agent(self.name.clone(), content.clone())));
        let failure = Err(ParticipantError::Backend(LlmError::transport(self.error.clone())));
        stream::iter(partial.chain(std::iter::once(failure))).boxed()
    }
}

// ============================================================================
// Stalled Participant (for cancellation testing)
// ============================================================================

/// Participant that yields one message, then hangs for `delay`
pub struct StalledParticipant {
    name: String,
    delay: Duration,
}

impl StalledParticipant {
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

impl Participant for StalledParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, _log: LogSnapshot, _cancel: CancellationToken) -> MessageStream<'_> {
        let first = stream::once(async move { Ok(Message::agent(self.name.clone(), "partial")) });
        let stall = stream::once(async move {
            tokio::time::sleep(self.delay).await;
            Ok(Message::agent(self.name.clone(), "too late"))
        });
        first.chain(stall).boxed()
    }
}
