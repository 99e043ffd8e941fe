//! One-shot prompt

use crate::llm::{LlmError, LlmRequest, LlmService};

pub const DEFAULT_PROMPT: &str = "Tell me a short joke about bananas.";

/// Send a single prompt and return the model's text
pub async fn ask(service: &dyn LlmService, prompt: &str) -> Result<String, LlmError> {
    let response = service.complete(&LlmRequest::prompt(prompt)).await?;
    Ok(response.text().trim().to_string())
}
