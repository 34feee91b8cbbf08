//! Provider trait and completion types
//!
//! The engine is provider-agnostic: template steps talk to an AI provider
//! through the [`Provider`] trait and nothing else. Concrete clients
//! (OpenAI-compatible, Anthropic, Ollama) live in the `cascade-llm` crate;
//! tests implement the trait directly with mocks.
//!
//! Template execution always streams (`stream: true` on the request) so
//! chunk events can be forwarded while the completion is produced.
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_core::provider::{ChatMessage, CompletionRequest, Provider};
//! use std::sync::Arc;
//!
//! let provider: Arc<dyn Provider> = Arc::new(my_client);
//! let request = CompletionRequest::new(vec![ChatMessage::user("Hello!")])
//!     .with_temperature(0.2)
//!     .with_stream(true);
//! let mut stream = provider.stream(request).await?;
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Wire-format string used by most chat APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request with builder-style configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation messages, in order
    pub messages: Vec<ChatMessage>,
    /// Model override; providers fall back to their configured model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether the caller intends to stream the response
    #[serde(default)]
    pub stream: bool,
}

impl CompletionRequest {
    /// Create a request from messages
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    /// Override the provider's configured model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap the number of output tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Mark the request as streaming
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A complete (non-streamed) provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Full completion text
    pub text: String,
    /// Model that produced the completion, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Prompt tokens, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    /// Completion tokens, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
}

/// One streamed fragment of a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Text delta; may be empty on the terminal chunk
    pub text: String,
    /// True on the final chunk
    pub done: bool,
}

impl CompletionChunk {
    /// A text delta
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    /// The terminal chunk
    pub fn finished() -> Self {
        Self {
            text: String::new(),
            done: true,
        }
    }
}

/// Stream of completion chunks
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionChunk>> + Send>>;

/// The seam between the engine and AI providers
///
/// Implementations are `Send + Sync` and shared behind `Arc`; the engine
/// never clones or reconfigures them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name used in provider maps and events
    fn name(&self) -> &str;

    /// Produce a complete response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Produce a chunk stream
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream>;

    /// Whether the provider can currently serve requests
    ///
    /// Default implementation assumes availability; local-model clients
    /// override this with a health check.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Providers keyed by the name workflows select them with
pub type ProviderMap = HashMap<String, Arc<dyn Provider>>;
