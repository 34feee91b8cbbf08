//! Ollama client for local model inference.
//!
//! Talks to `/api/chat`; responses stream as newline-delimited JSON rather
//! than SSE. `is_available` probes `/api/tags`, which answers whenever the
//! Ollama server is up.
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_llm::ollama::OllamaProvider;
//! use cascade_llm::config::LocalProviderConfig;
//! use cascade_core::{ChatMessage, CompletionRequest, Provider};
//!
//! let config = LocalProviderConfig::new("http://localhost:11434", "llama3");
//! let provider = OllamaProvider::new(config);
//!
//! let request = CompletionRequest::new(vec![ChatMessage::user("Hello!")]);
//! let response = provider.complete(request).await?;
//! ```

use crate::config::LocalProviderConfig;
use crate::error::ProviderError;
use crate::sse::LineBuffer;
use async_stream::try_stream;
use async_trait::async_trait;
use cascade_core::provider::{
    CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream, Provider,
};
use cascade_core::Result as CoreResult;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default Ollama server address.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaProvider {
    config: LocalProviderConfig,
    client: Client,
}

impl OllamaProvider {
    /// Create a new client with the given configuration.
    pub fn new(config: LocalProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Check whether the Ollama server is reachable.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OllamaRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        let mut options = HashMap::new();
        if let Some(temperature) = request.temperature {
            options.insert("temperature", Value::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict", Value::from(max_tokens));
        }

        OllamaRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages,
            stream,
            options: if options.is_empty() {
                None
            } else {
                Some(options)
            },
        }
    }

    async fn send(&self, body: &OllamaRequest) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/api/chat", self.config.base_url);

        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, message));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResponse> {
        let body = self.build_request(&request, false);
        let response = self.send(&body).await?;

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(CompletionResponse {
            text: parsed.message.map(|m| m.content).unwrap_or_default(),
            model: Some(parsed.model),
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> CoreResult<CompletionStream> {
        let body = self.build_request(&request, true);
        let response = self.send(&body).await?;
        tracing::debug!(model = %body.model, "opened completion stream");

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            let mut lines = LineBuffer::new();
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(ProviderError::HttpError)?;
                lines.push(&chunk);

                while let Some(line) = lines.next_line() {
                    let parsed: OllamaResponse = serde_json::from_str(&line)
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

                    if let Some(message) = parsed.message {
                        if !message.content.is_empty() {
                            yield CompletionChunk::delta(message.content);
                        }
                    }
                    if parsed.done {
                        break 'read;
                    }
                }
            }
            yield CompletionChunk::finished();
        };

        Ok(Box::pin(stream))
    }

    async fn is_available(&self) -> CoreResult<bool> {
        Ok(self.check_health().await)
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<&'static str, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Shape shared by the single-shot response and each NDJSON stream line.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}
