//! # Cascade Core - Workflow Execution Engine
//!
//! Declarative multi-step workflows over pluggable tools and LLM providers.
//! A workflow is a named sequence of steps; each step either invokes a
//! registered tool or renders a prompt template and streams it through a
//! provider. Step outputs feed later steps through `$reference` and
//! `{{placeholder}}` inputs.
//!
//! ## Features
//!
//! - **Declarative Definitions** - YAML/JSON workflows, validated at load time
//! - **Tool Steps** - instance or factory registration behind one [`Tool`] trait
//! - **Template Steps** - inline or URL-fetched prompts, streamed responses
//! - **Reference Resolution** - `$reference` dereferencing and `{{placeholder}}`
//!   substitution over prior step results
//! - **Per-Run Events** - each run gets its own tagged event channel
//! - **Fail-Fast Execution** - strictly sequential; the first error aborts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cascade_core::{EventSink, ToolRegistry, WorkflowManager};
//! use serde_json::Map;
//! use std::sync::Arc;
//!
//! # async fn example() -> cascade_core::Result<()> {
//! let registry = ToolRegistry::new();
//! // register tools on the registry here
//! let manager = WorkflowManager::new(Arc::new(registry));
//!
//! let name = manager
//!     .load_yaml_str(
//!         r#"
//! name: echo-once
//! steps:
//!   - tool: echo
//!     input:
//!       msg: "{{msg}}"
//!     output: reply
//! "#,
//!     )
//!     .await?;
//!
//! let (sink, mut events) = EventSink::channel();
//! let mut input = Map::new();
//! input.insert("msg".to_string(), serde_json::json!("hello"));
//! let results = manager.run_workflow(&name, input, &sink).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The [`WorkflowManager`] holds registered definitions and the shared
//! collaborators (tool registry, providers, template store). Each
//! [`run_workflow`](WorkflowManager::run_workflow) call builds a
//! [`WorkflowExecutor`] that walks the steps sequentially against a fresh
//! [`ExecutionContext`], emitting events to the caller's [`EventSink`].
//! Nothing persists between runs; callers that need history consume the
//! event channel.

// Core modules
pub mod context;
pub mod definition;
pub mod events;
pub mod manager;
pub mod provider;
pub mod resolver;
pub mod template;
pub mod tool;

// Executor module
pub mod executor;

// Error types and utilities
pub mod error;

// Re-export key types for convenience
pub use definition::{
    OutputBinding, StepKind, TemplateStep, ToolStep, WorkflowDefinition, WorkflowStep,
};
pub use executor::WorkflowExecutor;
pub use manager::WorkflowManager;

// Error types
pub use error::{Result, WorkflowError};

// Re-export context and result types
pub use context::{ExecutionContext, StepResult, StoredValue, ToolProvenance};

// Re-export tool types
pub use tool::{Tool, ToolDefinition, ToolEntry, ToolFactory, ToolRegistry};

// Re-export provider types
pub use provider::{
    ChatMessage, CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream,
    MessageRole, Provider, ProviderMap,
};

// Re-export template types
pub use template::{
    HttpTemplateLoader, OutputVariable, StaticTemplateLoader, TemplateDefinition, TemplateLoader,
    TemplateStore,
};

// Re-export event types
pub use events::{EventSink, WorkflowEvent};

// Re-export resolver entry points
pub use resolver::{coerce_to_string, resolve_inputs, substitute_with};
