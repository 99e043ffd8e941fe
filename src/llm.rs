//! LLM provider abstraction
//!
//! Provides a common interface for the chat-completion backends that
//! model-backed participants and prompt tools talk to.

mod error;
mod openai;
mod registry;
mod types;

pub use error::{LlmError, LlmErrorKind, Provider};
pub use openai::{OpenAIEndpoint, OpenAIService};
pub use registry::{ConfigError, LlmConfig};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.tool_uses().len(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e,
                    retryable = e.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Retries retryable failures with exponential backoff.
///
/// A `retry_after` hint from the provider replaces the computed delay.
pub struct RetryingService {
    inner: Arc<dyn LlmService>,
    max_retries: u32,
}

impl RetryingService {
    pub fn new(inner: Arc<dyn LlmService>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    // Exponential backoff: 1s, 2s, 4s, capped at 32s
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

#[async_trait]
impl LlmService for RetryingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = e.retry_after.unwrap_or_else(|| retry_delay(attempt));
                    tracing::warn!(
                        model = %self.inner.model_id(),
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Retrying LLM request"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::MockLlmClient;

    #[tokio::test(start_paused = true)]
    async fn test_retrying_service_recovers_from_transient_error() {
        let mock = Arc::new(MockLlmClient::new("mock"));
        mock.queue_error(LlmError::unavailable("overloaded"));
        mock.queue_response(LlmResponse::from_text("hello"));

        let service = RetryingService::new(mock.clone(), 2);
        let response = service.complete(&LlmRequest::prompt("hi")).await.unwrap();

        assert_eq!(response.text(), "hello");
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_service_gives_up_after_limit() {
        let mock = Arc::new(MockLlmClient::new("mock"));
        for _ in 0..3 {
            mock.queue_error(LlmError::transport("connection reset"));
        }

        let service = RetryingService::new(mock.clone(), 2);
        let err = service.complete(&LlmRequest::prompt("hi")).await.unwrap_err();

        assert_eq!(err.kind, LlmErrorKind::Transport);
        assert_eq!(mock.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_retrying_service_does_not_retry_auth() {
        let mock = Arc::new(MockLlmClient::new("mock"));
        mock.queue_error(LlmError::unauthorized("bad key"));
        mock.queue_response(LlmResponse::from_text("unreachable"));

        let service = RetryingService::new(mock.clone(), 5);
        let err = service.complete(&LlmRequest::prompt("hi")).await.unwrap_err();

        assert_eq!(err.kind, LlmErrorKind::Unauthorized);
        assert_eq!(mock.recorded_requests().len(), 1);
    }

    #[test]
    fn test_retry_delay_backoff() {
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(3), Duration::from_secs(4));
        assert_eq!(retry_delay(20), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_logging_service_passes_through() {
        let mock = Arc::new(MockLlmClient::new("gpt-4o"));
        mock.queue_response(LlmResponse::from_text("ok"));

        let service = LoggingService::new(mock);
        assert_eq!(service.model_id(), "gpt-4o");
        let response = service.complete(&LlmRequest::prompt("hi")).await.unwrap();
        assert_eq!(response.text(), "ok");
    }
}
