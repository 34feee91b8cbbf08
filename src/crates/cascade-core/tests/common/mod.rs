//! Common test utilities and mock collaborators

use async_trait::async_trait;
use cascade_core::{
    CompletionChunk, CompletionRequest, CompletionResponse, CompletionStream, Provider, Result,
    TemplateDefinition, TemplateLoader, Tool, ToolDefinition, WorkflowEvent,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

/// Tool that returns its input unchanged, recording every call
pub struct EchoTool {
    definition: ToolDefinition,
    pub calls: Arc<AtomicUsize>,
    pub inputs: Arc<Mutex<Vec<Value>>>,
}

impl EchoTool {
    pub fn new(name: &str) -> Self {
        Self {
            definition: ToolDefinition::new(name, "echoes its input", json!({"type": "object"})),
            calls: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input.clone());
        Ok(input)
    }
}

/// Tool that returns a fixed output, recording every call
pub struct FixedTool {
    definition: ToolDefinition,
    output: Value,
    pub calls: Arc<AtomicUsize>,
}

impl FixedTool {
    pub fn new(name: &str, output: Value) -> Self {
        Self {
            definition: ToolDefinition::new(name, "returns fixed output", json!({"type": "object"})),
            output,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Declare the key later `$references` should unwrap to
    pub fn with_reference_key(mut self, key: &str) -> Self {
        self.definition = self.definition.with_reference_key(key);
        self
    }
}

#[async_trait]
impl Tool for FixedTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, _input: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Tool that always fails with a fixed message
pub struct FailingTool {
    definition: ToolDefinition,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            definition: ToolDefinition::new(name, "always fails", json!({"type": "object"})),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, _input: Value) -> Result<Value> {
        Err(cascade_core::WorkflowError::tool_failed(
            &self.definition.name,
            &self.message,
        ))
    }
}

/// Provider that streams a scripted sequence of chunks, counting requests
pub struct ScriptedProvider {
    name: String,
    chunks: Vec<String>,
    pub requests: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(name: &str, chunks: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            text: self.chunks.concat(),
            model: None,
            input_tokens: None,
            output_tokens: None,
        })
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<CompletionStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut items: Vec<Result<CompletionChunk>> = self
            .chunks
            .iter()
            .map(|c| Ok(CompletionChunk::delta(c.clone())))
            .collect();
        items.push(Ok(CompletionChunk::finished()));
        Ok(futures::stream::iter(items).boxed())
    }
}

/// Template loader that serves registered templates, counting every load
pub struct CountingLoader {
    templates: HashMap<String, TemplateDefinition>,
    pub loads: Arc<AtomicUsize>,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_template(mut self, url: &str, template: TemplateDefinition) -> Self {
        self.templates.insert(url.to_string(), template);
        self
    }
}

#[async_trait]
impl TemplateLoader for CountingLoader {
    async fn load(&self, url: &str) -> Result<TemplateDefinition> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.templates.get(url).cloned().ok_or_else(|| {
            cascade_core::WorkflowError::TemplateFetch {
                url: url.to_string(),
                error: "no template registered for URL".to_string(),
            }
        })
    }
}

/// Drain a closed event channel into a vector
///
/// The sender side must be dropped before calling, otherwise this never
/// returns.
pub async fn drain_events(mut receiver: UnboundedReceiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    events
}

/// Short labels for asserting event sequences
pub fn event_kinds(events: &[WorkflowEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            WorkflowEvent::StepStarted { .. } => "step_started",
            WorkflowEvent::StepCompleted { .. } => "step_completed",
            WorkflowEvent::StepFailed { .. } => "step_failed",
            WorkflowEvent::ToolExecution { .. } => "tool_execution",
            WorkflowEvent::RequestSent { .. } => "request_sent",
            WorkflowEvent::StreamChunk { .. } => "stream_chunk",
        })
        .collect()
}
