//! Anthropic messages API client.
//!
//! Talks to `/v1/messages` with `x-api-key` and `anthropic-version` headers.
//! System messages are lifted into the request's top-level `system` field;
//! streamed text arrives as `content_block_delta` SSE events.
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_llm::anthropic::AnthropicProvider;
//! use cascade_llm::config::RemoteProviderConfig;
//! use cascade_core::{ChatMessage, CompletionRequest, Provider};
//!
//! let config = RemoteProviderConfig::from_env(
//!     "ANTHROPIC_API_KEY",
//!     "https://api.anthropic.com",
//!     "claude-sonnet-4-20250514",
//! )?;
//! let provider = AnthropicProvider::new(config);
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
    ChatMessage, CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream,
    MessageRole, Provider,
};
use cascade_core::Result as CoreResult;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Hosted Anthropic API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Output token cap the messages API requires when none is configured.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Client for Anthropic's messages API.
#[derive(Clone)]
pub struct AnthropicProvider {
    config: RemoteProviderConfig,
    client: Client,
}

impl AnthropicProvider {
    /// Create a new client with the given configuration.
    pub fn new(config: RemoteProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Split chat messages into the top-level system prompt and the
    /// conversation turns the messages API accepts.
    fn convert_messages(&self, messages: &[ChatMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut turns = Vec::new();

        for message in messages {
            match message.role {
                MessageRole::System => system_parts.push(&message.content),
                MessageRole::User | MessageRole::Assistant => turns.push(AnthropicMessage {
                    role: message.role.as_str().to_string(),
                    content: message.content.clone(),
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, turns)
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> AnthropicRequest {
        let (system, messages) = self.convert_messages(&request.messages);

        AnthropicRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages,
            system,
            max_tokens: request
                .max_tokens
                .or(self.config.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature.or(self.config.temperature),
            stream,
        }
    }

    async fn send(&self, body: &AnthropicRequest) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResponse> {
        let body = self.build_request(&request, false);
        let response = self.send(&body).await?;

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            text,
            model: Some(parsed.model),
            input_tokens: parsed.usage.as_ref().map(|u| u.input_tokens),
            output_tokens: parsed.usage.as_ref().map(|u| u.output_tokens),
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
                    match classify_data(&data) {
                        StreamFragment::Delta(text) if !text.is_empty() => {
                            yield CompletionChunk::delta(text);
                        }
                        StreamFragment::Delta(_) => {}
                        StreamFragment::Stop => break 'read,
                        StreamFragment::Ignored => {}
                    }
                }
            }
            yield CompletionChunk::finished();
        };

        Ok(Box::pin(stream))
    }
}

enum StreamFragment {
    Delta(String),
    Stop,
    Ignored,
}

/// Classify one SSE `data:` payload from the messages stream.
///
/// Only `content_block_delta` carries text; `message_stop` ends the turn.
/// Everything else (message_start, ping, usage deltas) is bookkeeping.
fn classify_data(data: &str) -> StreamFragment {
    match serde_json::from_str::<AnthropicStreamEvent>(data) {
        Ok(AnthropicStreamEvent::ContentBlockDelta { delta }) => {
            StreamFragment::Delta(delta.text.unwrap_or_default())
        }
        Ok(AnthropicStreamEvent::MessageStop) => StreamFragment::Stop,
        Ok(AnthropicStreamEvent::Other) | Err(_) => StreamFragment::Ignored,
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicStreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: AnthropicDelta },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
}
