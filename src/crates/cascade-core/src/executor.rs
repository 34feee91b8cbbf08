//! Sequential workflow execution
//!
//! The executor walks a workflow's steps strictly in order, resolving each
//! step's declared inputs against the accumulated context, dispatching to a
//! tool or a template/provider pair, and storing the result under the step's
//! output binding. The first failing step aborts the run; remaining steps
//! never start.
//!
//! # Lifecycle
//!
//! Per step, in order:
//! 1. Emit `StepStarted`.
//! 2. Resolve declared inputs against the context.
//! 3. Dispatch to the tool or the template's provider.
//! 4. Store the result under the step's output binding.
//! 5. Emit `StepCompleted` (or `StepFailed`, then abort).
//!
//! Events go to the per-run [`EventSink`]; emission is fire-and-forget and
//! never affects the run's outcome.

use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::{ExecutionContext, StepResult, StoredValue, ToolProvenance};
use crate::definition::{TemplateStep, ToolStep, WorkflowDefinition, WorkflowStep};
use crate::error::{Result, WorkflowError};
use crate::events::{EventSink, WorkflowEvent};
use crate::provider::{ChatMessage, CompletionRequest, ProviderMap};
use crate::resolver::resolve_inputs;
use crate::template::TemplateStore;
use crate::tool::ToolRegistry;

/// Executes workflow definitions against a registry, providers, and templates
///
/// The executor holds shared collaborators only; per-run state lives in the
/// [`ExecutionContext`] created for each [`execute`](Self::execute) call, so
/// one executor can serve concurrent runs.
pub struct WorkflowExecutor {
    /// Tool lookup, re-checked at dispatch time
    registry: Arc<ToolRegistry>,
    /// Providers addressable from template steps
    providers: ProviderMap,
    /// Inline and remote templates, cached fetch-once per URL
    templates: Arc<TemplateStore>,
    /// Credentials merged into every tool's construction config
    auth_config: Option<Value>,
}

impl WorkflowExecutor {
    /// Create an executor over a tool registry
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            providers: ProviderMap::new(),
            templates: Arc::new(TemplateStore::default()),
            auth_config: None,
        }
    }

    /// Replace the provider map
    pub fn with_providers(mut self, providers: ProviderMap) -> Self {
        self.providers = providers;
        self
    }

    /// Add a single named provider
    pub fn with_provider(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn crate::provider::Provider>,
    ) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Share a template store (typically the manager's)
    pub fn with_templates(mut self, templates: Arc<TemplateStore>) -> Self {
        self.templates = templates;
        self
    }

    /// Set credentials passed to tool construction under `authConfig`
    pub fn with_auth_config(mut self, config: Value) -> Self {
        self.auth_config = Some(config);
        self
    }

    /// Execute a workflow to completion
    ///
    /// Runs every step sequentially and returns the full results map on
    /// success. On the first step failure the error is wrapped with the
    /// step index, a `StepFailed` event is emitted, and the run aborts
    /// with no partial continuation and no retry.
    #[tracing::instrument(
        skip(self, workflow, initial_input, sink),
        fields(workflow = %workflow.name, steps = workflow.steps.len())
    )]
    pub async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        initial_input: Map<String, Value>,
        sink: &EventSink,
    ) -> Result<HashMap<String, StoredValue>> {
        let run_id = Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, "starting workflow run");

        let mut context = ExecutionContext::with_initial_input(initial_input);

        for (index, step) in workflow.steps.iter().enumerate() {
            let target = step_target(step);
            sink.emit(WorkflowEvent::step_started(
                &run_id,
                index,
                step.kind(),
                &target,
            ));

            let result = match self
                .execute_step(workflow, step, index, &run_id, &context, sink)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    let error = if e.has_step_context() {
                        e
                    } else {
                        WorkflowError::step_execution(index, e.to_string())
                    };
                    sink.emit(WorkflowEvent::step_failed(&run_id, index, error.to_string()));
                    tracing::error!(
                        run_id = %run_id,
                        step = index,
                        target = %target,
                        error = %error,
                        "workflow step failed, aborting run"
                    );
                    return Err(error);
                }
            };

            context.store_step_result(step.output(), result);
            sink.emit(WorkflowEvent::step_completed(&run_id, index, &target));
        }

        tracing::info!(run_id = %run_id, "workflow run completed");
        Ok(context.results)
    }

    /// Resolve inputs and dispatch a single step
    async fn execute_step(
        &self,
        workflow: &WorkflowDefinition,
        step: &WorkflowStep,
        index: usize,
        run_id: &str,
        context: &ExecutionContext,
        sink: &EventSink,
    ) -> Result<StepResult> {
        let resolved = resolve_inputs(step.input(), context)?;

        match step {
            WorkflowStep::Tool(tool_step) => {
                self.execute_tool_step(tool_step, index, run_id, resolved, sink)
                    .await
            }
            WorkflowStep::Template(template_step) => {
                self.execute_template_step(workflow, template_step, index, run_id, resolved, sink)
                    .await
            }
        }
    }

    /// Dispatch a tool step
    ///
    /// The registry is re-checked here even though the manager validated the
    /// tool at load time: registrations can change between load and run.
    async fn execute_tool_step(
        &self,
        step: &ToolStep,
        index: usize,
        run_id: &str,
        resolved: Map<String, Value>,
        sink: &EventSink,
    ) -> Result<StepResult> {
        let entry = self.registry.resolve(&step.tool)?;
        let definition = entry.definition().clone();

        let tool = entry.instantiate(self.construction_config(&resolved))?;

        let input = Value::Object(resolved);
        definition.validate_input(&input)?;

        sink.emit(WorkflowEvent::tool_execution(
            run_id,
            index,
            &step.tool,
            input.clone(),
        ));
        tracing::debug!(tool = %step.tool, step = index, "invoking tool");

        let raw = tool.invoke(input).await?;

        let mut provenance = ToolProvenance::new(&definition.name);
        if let Some(key) = &definition.reference_key {
            provenance = provenance.with_reference_key(key);
        }
        StepResult::from_tool_output(raw, provenance)
    }

    /// Dispatch a template step through its provider
    async fn execute_template_step(
        &self,
        workflow: &WorkflowDefinition,
        step: &TemplateStep,
        index: usize,
        run_id: &str,
        resolved: Map<String, Value>,
        sink: &EventSink,
    ) -> Result<StepResult> {
        let template = match (&step.template, &step.template_url) {
            (Some(name), url) => match self.templates.get_by_name(name).await {
                Some(template) => template,
                // Lazy fallback when the manager did not pre-resolve the URL.
                None => match url {
                    Some(url) => self.templates.fetch(url).await?,
                    None => return Err(WorkflowError::TemplateNotFound { step: index }),
                },
            },
            (None, Some(url)) => self.templates.fetch(url).await?,
            (None, None) => return Err(WorkflowError::TemplateNotFound { step: index }),
        };

        let provider_name = step
            .provider
            .as_deref()
            .or(workflow.default_provider.as_deref());
        let provider = match provider_name {
            Some(name) => {
                self.providers
                    .get(name)
                    .ok_or_else(|| WorkflowError::ProviderNotFound {
                        provider: Some(name.to_string()),
                    })?
            }
            None => return Err(WorkflowError::ProviderNotFound { provider: None }),
        };

        let prompt = template.render(&resolved);
        let mut messages = Vec::new();
        if let Some(system) = &template.system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let request = CompletionRequest::new(messages).with_stream(true);

        sink.emit(WorkflowEvent::request_sent(
            run_id,
            index,
            provider.name(),
            &template.name,
        ));
        tracing::debug!(
            template = %template.name,
            provider = %provider.name(),
            step = index,
            "sending completion request"
        );

        let mut stream = provider.stream(request).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.text.is_empty() {
                sink.emit(WorkflowEvent::stream_chunk(run_id, index, &chunk.text));
                text.push_str(&chunk.text);
            }
            if chunk.done {
                break;
            }
        }

        let outputs = template.extract_outputs(&text);
        Ok(StepResult::from_template_output(text, outputs))
    }

    /// Build the construction config for a tool instance
    ///
    /// The step's resolved `config` object (when present) is extended with
    /// the executor's credentials under the `authConfig` key.
    fn construction_config(&self, resolved: &Map<String, Value>) -> Value {
        let mut config = match resolved.get("config") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        if let Some(auth) = &self.auth_config {
            config.insert("authConfig".to_string(), auth.clone());
        }
        Value::Object(config)
    }
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("tools", &self.registry.len())
            .field("providers", &self.providers.len())
            .finish_non_exhaustive()
    }
}

/// Human-readable target for step events: tool name, template name, or URL
fn step_target(step: &WorkflowStep) -> String {
    match step {
        WorkflowStep::Tool(s) => s.tool.clone(),
        WorkflowStep::Template(s) => s
            .template
            .clone()
            .or_else(|| s.template_url.clone())
            .unwrap_or_default(),
    }
}
