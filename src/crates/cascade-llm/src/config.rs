//! Shared configuration for provider clients.

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for hosted API providers (OpenAI-compatible, Anthropic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProviderConfig {
    /// API key sent with every request.
    pub api_key: String,

    /// Base URL for the API.
    ///
    /// Examples:
    /// - OpenAI: "https://api.openai.com/v1"
    /// - Anthropic: "https://api.anthropic.com"
    pub base_url: String,

    /// Model used when a request does not name one.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Output token cap applied when a request does not set one.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature applied when a request does not set one.
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl RemoteProviderConfig {
    /// Create a new remote provider configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Read the API key from an environment variable.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| ProviderError::ApiKeyNotFound(format!("environment variable {}", env_var)))?;

        Ok(Self::new(api_key, base_url, model))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default output token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the default sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Configuration for providers running on localhost or the local network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalProviderConfig {
    /// Base URL of the local server, e.g. "http://localhost:11434" for Ollama.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl LocalProviderConfig {
    /// Create a new local provider configuration.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Read the base URL from an environment variable, falling back to a
    /// default when the variable is unset.
    pub fn from_env(env_var: &str, default_base_url: &str, model: impl Into<String>) -> Self {
        let base_url =
            std::env::var(env_var).unwrap_or_else(|_| default_base_url.to_string());
        Self::new(base_url, model)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_config_builder() {
        let config = RemoteProviderConfig::new("test-key", "https://api.openai.com/v1", "gpt-4o")
            .with_timeout(Duration::from_secs(30))
            .with_max_tokens(512)
            .with_temperature(0.2);

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_tokens, Some(512));
        assert_eq!(config.temperature, Some(0.2));
    }

    #[test]
    fn test_local_config_builder() {
        let config = LocalProviderConfig::new("http://localhost:11434", "llama3")
            .with_timeout(Duration::from_secs(10));

        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_remote_from_env_missing_key() {
        let err = RemoteProviderConfig::from_env(
            "CASCADE_TEST_KEY_THAT_DOES_NOT_EXIST",
            "https://api.openai.com/v1",
            "gpt-4o",
        )
        .unwrap_err();

        assert!(err.is_auth_error());
    }

    #[test]
    fn test_local_from_env_falls_back_to_default() {
        let config = LocalProviderConfig::from_env(
            "CASCADE_TEST_URL_THAT_DOES_NOT_EXIST",
            "http://localhost:11434",
            "llama3",
        );

        assert_eq!(config.base_url, "http://localhost:11434");
    }
}
