//! Backend configuration and construction

use super::{LlmService, LoggingService, OpenAIEndpoint, OpenAIService, RetryingService};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no model backend configured: set AZUREOPENAI_ENDPOINT and AZUREOPENAI_APIKEY, or OPENAI_API_KEY")]
    NoBackend,
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("failed to create backend: {0}")]
    Backend(String),
}

/// Configuration for the model backend
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let timeout = match get("LLM_TIMEOUT_SECS") {
            Some(value) => Some(Duration::from_secs(value.parse().map_err(|_| {
                ConfigError::InvalidValue {
                    name: "LLM_TIMEOUT_SECS",
                    value,
                }
            })?)),
            None => None,
        };

        let max_retries = match get("LLM_MAX_RETRIES") {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "LLM_MAX_RETRIES",
                value,
            })?),
            None => None,
        };

        Ok(Self {
            azure_endpoint: get("AZUREOPENAI_ENDPOINT"),
            azure_api_key: get("AZUREOPENAI_APIKEY"),
            azure_deployment: get("AZUREOPENAI_DEPLOYMENT"),
            azure_api_version: get("AZUREOPENAI_API_VERSION"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            default_model: get("DEFAULT_MODEL"),
            timeout,
            max_retries,
        })
    }

    pub fn model_id(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Azure wins when both its endpoint and key are present
    pub fn endpoint(&self) -> Result<OpenAIEndpoint, ConfigError> {
        if let (Some(endpoint), Some(api_key)) = (&self.azure_endpoint, &self.azure_api_key) {
            return Ok(OpenAIEndpoint::Azure {
                endpoint: endpoint.clone(),
                api_key: api_key.clone(),
                deployment: self
                    .azure_deployment
                    .clone()
                    .unwrap_or_else(|| self.model_id().to_string()),
                api_version: self
                    .azure_api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            });
        }

        match &self.openai_api_key {
            Some(api_key) => Ok(OpenAIEndpoint::OpenAI {
                api_key: api_key.clone(),
                base_url: self.openai_base_url.clone(),
            }),
            None => Err(ConfigError::NoBackend),
        }
    }

    /// Create the backend, wrapped with retry and logging
    pub fn build_service(&self) -> Result<Arc<dyn LlmService>, ConfigError> {
        let endpoint = self.endpoint()?;
        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let service = OpenAIService::new(endpoint, self.model_id(), timeout)
            .map_err(|e| ConfigError::Backend(e.to_string()))?;

        let retrying = RetryingService::new(
            Arc::new(service),
            self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        );
        Ok(Arc::new(LoggingService::new(Arc::new(retrying))))
    }
}
