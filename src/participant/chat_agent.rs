//! Model-backed participant
//!
//! Sends the conversation to a chat-completion backend under fixed
//! instructions. When given tools, it runs the model's tool calls itself and
//! feeds the results back until the model answers in plain text; none of that
//! exchange reaches the shared log.

use super::{MessageStream, Participant, ParticipantError};
use crate::conversation::{LogSnapshot, Message, Role};
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, LlmService};
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

pub struct ChatAgent {
    name: String,
    instructions: String,
    service: Arc<dyn LlmService>,
    tools: Option<ToolRegistry>,
    max_tool_rounds: u32,
    call_timeout: Option<Duration>,
    max_tokens: Option<u32>,
}

/// Progress of one `produce` call
struct Exchange {
    system: Vec<String>,
    messages: Vec<LlmMessage>,
    tool_rounds: u32,
    done: bool,
    cancel: CancellationToken,
}

impl ChatAgent {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        service: Arc<dyn LlmService>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            service,
            tools: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            call_timeout: None,
            max_tokens: None,
        }
    }

    /// Let the model call these tools automatically
    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = (!tools.is_empty()).then_some(tools);
        self
    }

    #[must_use]
    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Give up on a single backend call after `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Translate the shared log into the model's view of the conversation.
    ///
    /// Our own messages become assistant turns; other agents speak to us as
    /// users, prefixed with their name.
    fn build_exchange(&self, log: &LogSnapshot, cancel: CancellationToken) -> Exchange {
        let mut system = Vec::new();
        if !self.instructions.is_empty() {
            system.push(self.instructions.clone());
        }

        let mut messages = Vec::new();
        for message in log.iter() {
            match message.role {
                Role::System => system.push(message.content.clone()),
                Role::Agent if message.is_from(&self.name) => {
                    messages.push(LlmMessage::assistant(vec![ContentBlock::text(
                        message.content.clone(),
                    )]));
                }
                Role::Agent => {
                    let author = message.author.as_deref().unwrap_or("agent");
                    messages.push(LlmMessage::user(format!("{author}: {}", message.content)));
                }
                Role::User => messages.push(LlmMessage::user(message.content.clone())),
            }
        }

        Exchange {
            system,
            messages,
            tool_rounds: 0,
            done: false,
            cancel,
        }
    }

    fn request(&self, exchange: &Exchange) -> LlmRequest {
        LlmRequest {
            system: exchange.system.clone(),
            messages: exchange.messages.clone(),
            tools: self
                .tools
                .as_ref()
                .map(ToolRegistry::definitions)
                .unwrap_or_default(),
            max_tokens: self.max_tokens,
        }
    }

    async fn call(&self, request: &LlmRequest) -> Result<LlmResponse, ParticipantError> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.service.complete(request))
                .await
                .map_err(|_| ParticipantError::Timeout(limit))?
                .map_err(ParticipantError::from),
            None => self.service.complete(request).await.map_err(ParticipantError::from),
        }
    }

    async fn run_tools(&self, response: &LlmResponse, cancel: &CancellationToken) -> Vec<ContentBlock> {
        let calls: Vec<(String, String, Value)> = response
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
            .collect();

        let mut results = Vec::with_capacity(calls.len());
        for (id, name, input) in calls {
            tracing::debug!(agent = %self.name, tool = %name, "Invoking tool");
            let ctx = ToolContext::new(cancel.child_token());
            let output = match &self.tools {
                Some(registry) => registry.execute(&name, input, ctx).await,
                None => None,
            }
            .unwrap_or_else(|| ToolOutput::error(format!("Unknown tool: {name}")));

            if !output.success {
                tracing::warn!(agent = %self.name, tool = %name, output = %output.output, "Tool failed");
            }
            results.push(ContentBlock::tool_result(id, output.output, !output.success));
        }
        results
    }

    /// Advance the exchange until the next message is ready or the turn ends
    async fn next_message(&self, exchange: &mut Exchange) -> Option<Result<Message, ParticipantError>> {
        while !exchange.done {
            let request = self.request(exchange);
            let response = match self.call(&request).await {
                Ok(r) => r,
                Err(e) => {
                    exchange.done = true;
                    return Some(Err(e));
                }
            };

            let text = response.text().trim().to_string();

            if !response.has_tool_use() {
                exchange.done = true;
                return (!text.is_empty()).then(|| Ok(Message::agent(self.name.clone(), text)));
            }

            if exchange.tool_rounds >= self.max_tool_rounds {
                exchange.done = true;
                return Some(Err(ParticipantError::Other(format!(
                    "exceeded {} tool rounds without a final answer",
                    self.max_tool_rounds
                ))));
            }
            exchange.tool_rounds += 1;

            let results = self.run_tools(&response, &exchange.cancel).await;
            exchange
                .messages
                .push(LlmMessage::assistant(response.content));
            exchange.messages.push(LlmMessage {
                role: crate::llm::MessageRole::User,
                content: results,
            });

            if !text.is_empty() {
                return Some(Ok(Message::agent(self.name.clone(), text)));
            }
        }
        None
    }
}

impl Participant for ChatAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, log: LogSnapshot, cancel: CancellationToken) -> MessageStream<'_> {
        let exchange = self.build_exchange(&log, cancel);
        stream::unfold(exchange, move |mut exchange| async move {
            let item = self.next_message(&mut exchange).await?;
            Some((item, exchange))
        })
        .boxed()
    }
}
