//! Backend call failures
//!
//! Every failure carries enough context to explain a participant failure to
//! the operator: which deployment answered, the HTTP status if there was one,
//! and whether a retry may help.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The kind of deployment a request went to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Azure,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => f.write_str("OpenAI"),
            Provider::Azure => f.write_str("Azure OpenAI"),
        }
    }
}

/// A chat-completion call that produced no usable response
#[derive(Debug, Clone, Error)]
#[error("{}{message}", origin(.provider.as_ref(), .status.as_ref()))]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    pub provider: Option<Provider>,
    /// HTTP status, when the backend answered at all
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
}

fn origin(provider: Option<&Provider>, status: Option<&u16>) -> String {
    match (provider, status) {
        (Some(p), Some(s)) => format!("{p} returned HTTP {s}: "),
        (Some(p), None) => format!("{p}: "),
        (None, Some(s)) => format!("HTTP {s}: "),
        (None, None) => String::new(),
    }
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            status: None,
            retry_after: None,
        }
    }

    /// Classify a non-success HTTP answer
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => LlmErrorKind::Unauthorized,
            408 => LlmErrorKind::Transport,
            429 => LlmErrorKind::Throttled,
            500..=599 => LlmErrorKind::Unavailable,
            _ => LlmErrorKind::Rejected,
        };
        Self {
            status: Some(status),
            ..Self::new(kind, message)
        }
    }

    #[must_use]
    pub fn at(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Transport, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unavailable, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unauthorized, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Protocol, message)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::Transport | LlmErrorKind::Throttled | LlmErrorKind::Unavailable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// No answer: connect failure, timeout, truncated body
    Transport,
    /// 429
    Throttled,
    /// 5xx
    Unavailable,
    /// Bad or missing key
    Unauthorized,
    /// The backend refused the request as sent
    Rejected,
    /// The answer could not be understood
    Protocol,
}
