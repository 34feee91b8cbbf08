//! OpenAI-compatible chat completions client.
//!
//! Talks to the `/chat/completions` endpoint with Bearer auth. The wire
//! format is shared by many hosted and self-hosted gateways, so
//! `with_base_url` points the same client at any OpenAI-compatible endpoint
//! (OpenRouter, vLLM, LM Studio, ...).
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_llm::openai::OpenAiProvider;
//! use cascade_llm::config::RemoteProviderConfig;
//! use cascade_core::{ChatMessage, CompletionRequest, Provider};
//!
//! let config = RemoteProviderConfig::from_env(
//!     "OPENAI_API_KEY",
//!     "https://api.openai.com/v1",
//!     "gpt-4o-mini",
//! )?;
//! let provider = OpenAiProvider::new(config);
//!
//! let request = CompletionRequest::new(vec![ChatMessage::user("Hello!")]);
//! let response = provider.complete(request).await?;
//! ```

use crate::config::RemoteProviderConfig;
use crate::error::ProviderError;
use crate::sse::{sse_data, LineBuffer};
use async_stream::try_stream;
use async_trait::async_trait;
use cascade_core::provider::{
    CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream, Provider,
};
use cascade_core::Result as CoreResult;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Hosted OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for OpenAI and OpenAI-compatible chat APIs.
#[derive(Clone)]
pub struct OpenAiProvider {
    name: String,
    config: RemoteProviderConfig,
    client: Client,
}

impl OpenAiProvider {
    /// Create a new client with the given configuration.
    pub fn new(config: RemoteProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "openai".to_string(),
            config,
            client,
        }
    }

    /// Register the client under a different provider name.
    ///
    /// Useful when several OpenAI-compatible endpoints coexist in one
    /// provider map.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Build the request body, filling unset knobs from the configuration.
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OpenAiRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        OpenAiRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages,
            temperature: request.temperature.or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            stream,
        }
    }

    async fn send(&self, body: &OpenAiRequest) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, message));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResponse> {
        let body = self.build_request(&request, false);
        let response = self.send(&body).await?;

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

        Ok(CompletionResponse {
            text: choice.message.content.unwrap_or_default(),
            model: Some(parsed.model),
            input_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
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
                    let Some(data) = sse_data(&line).map(str::to_string) else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'read;
                    }
                    if let Some(delta) = delta_from_data(&data) {
                        if !delta.is_empty() {
                            yield CompletionChunk::delta(delta);
                        }
                    }
                }
            }
            yield CompletionChunk::finished();
        };

        Ok(Box::pin(stream))
    }
}

/// Text delta carried by one SSE `data:` payload, if any.
///
/// Unparseable payloads are skipped rather than failing the stream; some
/// gateways interleave non-standard bookkeeping events.
fn delta_from_data(data: &str) -> Option<String> {
    let event: OpenAiStreamEvent = serde_json::from_str(data).ok()?;
    event.choices.into_iter().next()?.delta.content
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamEvent {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}
