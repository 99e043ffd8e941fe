//! Prompt-backed tool
//!
//! Wraps a prompt template as a callable function: the model fills the
//! `{{input}}` placeholder and a backend answers the rendered prompt.

use super::{Tool, ToolContext, ToolOutput};
use crate::llm::{LlmRequest, LlmService};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const INPUT_PLACEHOLDER: &str = "{{input}}";
const PROMPT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PromptTool {
    name: String,
    description: String,
    template: String,
    service: Arc<dyn LlmService>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PromptInput {
    input: String,
}

impl PromptTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        template: impl Into<String>,
        service: Arc<dyn LlmService>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            template: template.into(),
            service,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn render(&self, input: &str) -> String {
        if self.template.contains(INPUT_PLACEHOLDER) {
            self.template.replace(INPUT_PLACEHOLDER, input)
        } else {
            format!("{}\n{input}", self.template)
        }
    }
}

#[async_trait]
impl Tool for PromptTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["input"],
            "properties": {
                "input": {
                    "type": "string",
                    "description": "Text to substitute into the prompt"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input = match serde_json::from_value::<PromptInput>(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let mut request = LlmRequest::prompt(self.render(&input.input));
        request.max_tokens = self.max_tokens;

        tokio::select! {
            biased;

            () = ctx.cancel.cancelled() => ToolOutput::error("Cancelled"),

            result = timeout(PROMPT_TIMEOUT, self.service.complete(&request)) => match result {
                Ok(Ok(response)) => ToolOutput::success(response.text().trim()),
                Ok(Err(e)) => {
                    tracing::warn!(tool = %self.name, error = %e, "Prompt tool LLM error");
                    ToolOutput::error(e.to_string())
                }
                Err(_) => {
                    tracing::warn!(tool = %self.name, "Prompt tool timed out");
                    ToolOutput::error("Timed out")
                }
            },
        }
    }
}
