//! AI provider clients for the cascade workflow engine.
//!
//! This crate provides concrete implementations of the `Provider` trait from
//! `cascade-core`, for both hosted APIs and local model servers.
//!
//! # Providers
//!
//! - **OpenAI** - the hosted API and any OpenAI-compatible endpoint
//!   (`with_base_url` re-points the same client)
//! - **Anthropic** - the messages API
//! - **Ollama** - local inference with NDJSON streaming and a health probe
//!
//! # Example Usage
//!
//! ## Remote provider (OpenAI)
//!
//! ```rust,ignore
//! use cascade_llm::{OpenAiProvider, RemoteProviderConfig};
//! use cascade_core::{ChatMessage, CompletionRequest, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RemoteProviderConfig::from_env(
//!         "OPENAI_API_KEY",
//!         "https://api.openai.com/v1",
//!         "gpt-4o-mini",
//!     )?;
//!     let provider = OpenAiProvider::new(config);
//!
//!     let request = CompletionRequest::new(vec![ChatMessage::user("What is Rust?")]);
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.text);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Local provider (Ollama)
//!
//! ```rust,ignore
//! use cascade_llm::{LocalProviderConfig, OllamaProvider};
//! use cascade_core::{ChatMessage, CompletionRequest, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LocalProviderConfig::new("http://localhost:11434", "llama3");
//!     let provider = OllamaProvider::new(config);
//!
//!     if provider.is_available().await? {
//!         let request = CompletionRequest::new(vec![ChatMessage::user("Hello!")]);
//!         let response = provider.complete(request).await?;
//!         println!("{}", response.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod anthropic;
pub mod config;
pub mod error;
pub mod ollama;
pub mod openai;

mod sse;

// Re-export commonly used types
pub use anthropic::{AnthropicProvider, ANTHROPIC_BASE_URL};
pub use config::{LocalProviderConfig, RemoteProviderConfig};
pub use error::{ProviderError, Result};
pub use ollama::{OllamaProvider, OLLAMA_BASE_URL};
pub use openai::{OpenAiProvider, OPENAI_BASE_URL};

// Re-export cascade-core provider types for convenience
pub use cascade_core::provider::{
    ChatMessage, CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream,
    MessageRole, Provider, ProviderMap,
};
