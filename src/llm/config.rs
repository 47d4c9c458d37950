//! Completion endpoint configuration

use super::{LlmError, LlmService, LoggingService, OpenAIService};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-5.2";

/// Key sent when a gateway injects credentials itself
const GATEWAY_IMPLICIT_KEY: &str = "implicit";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    /// LLM gateway base URL; credentials are supplied by the gateway
    pub gateway: Option<String>,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            gateway: None,
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            gateway: non_empty("LLM_GATEWAY"),
            model: non_empty("BALLOT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the logged service, or `None` when no credentials are configured
    pub fn build_service(&self) -> Result<Option<Arc<dyn LlmService>>, LlmError> {
        let api_key = match (&self.gateway, &self.openai_api_key) {
            (Some(_), _) => GATEWAY_IMPLICIT_KEY.to_string(),
            (None, Some(key)) => key.clone(),
            (None, None) => return Ok(None),
        };

        let service = OpenAIService::new(
            api_key,
            self.model.clone(),
            self.gateway.as_deref(),
            self.request_timeout,
        )?;
        Ok(Some(Arc::new(LoggingService::new(Arc::new(service)))))
    }
}
