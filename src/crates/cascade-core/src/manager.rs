//! Workflow registration and run dispatch
//!
//! The manager owns the registered workflow definitions plus the shared
//! collaborators every run needs: the tool registry, the provider map, the
//! template store, and optional credentials. Registration validates
//! definitions eagerly — unknown tools and unreachable template URLs fail
//! at load time, not halfway through a run.
//!
//! # Example
//!
//! ```rust,no_run
//! use cascade_core::manager::WorkflowManager;
//! use cascade_core::events::EventSink;
//! use cascade_core::tool::ToolRegistry;
//! use serde_json::Map;
//! use std::sync::Arc;
//!
//! # async fn demo() -> cascade_core::error::Result<()> {
//! let registry = Arc::new(ToolRegistry::new());
//! let manager = WorkflowManager::new(registry);
//!
//! let name = manager.load_yaml_file("workflows/triage.yaml").await?;
//! let results = manager
//!     .run_workflow(&name, Map::new(), &EventSink::null())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::context::StoredValue;
use crate::definition::WorkflowDefinition;
use crate::error::{Result, WorkflowError};
use crate::events::EventSink;
use crate::executor::WorkflowExecutor;
use crate::provider::{Provider, ProviderMap};
use crate::template::{TemplateDefinition, TemplateLoader, TemplateStore};
use crate::tool::ToolRegistry;

/// Registers workflows and dispatches runs
pub struct WorkflowManager {
    registry: Arc<ToolRegistry>,
    providers: ProviderMap,
    templates: Arc<TemplateStore>,
    auth_config: Option<Value>,
    workflows: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowManager {
    /// Manager over a tool registry, with no providers and an HTTP template
    /// loader
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            providers: ProviderMap::new(),
            templates: Arc::new(TemplateStore::default()),
            auth_config: None,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Add a named provider for template steps
    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Set credentials passed to tool construction under `authConfig`
    pub fn with_auth_config(mut self, config: Value) -> Self {
        self.auth_config = Some(config);
        self
    }

    /// Replace the template loader (and its cache)
    pub fn with_template_loader(mut self, loader: Arc<dyn TemplateLoader>) -> Self {
        self.templates = Arc::new(TemplateStore::new(loader));
        self
    }

    /// Register a workflow definition
    ///
    /// Validates the definition's structure, checks that every tool step
    /// names a registered tool, and prefetches every `templateUrl` through
    /// the store's fetch-once cache. Any failure aborts registration.
    /// Registering under an existing name overwrites the previous
    /// definition.
    pub async fn register_workflow(&self, workflow: WorkflowDefinition) -> Result<()> {
        workflow.validate()?;

        for tool in workflow.referenced_tools() {
            if !self.registry.has_tool(tool) {
                return Err(WorkflowError::tool_not_found(tool));
            }
        }

        for url in workflow.referenced_template_urls() {
            self.templates.fetch(url).await?;
        }

        let name = workflow.name.clone();
        let replaced = self
            .workflows
            .write()
            .await
            .insert(name.clone(), Arc::new(workflow))
            .is_some();

        if replaced {
            tracing::info!(workflow = %name, "replaced registered workflow");
        } else {
            tracing::info!(workflow = %name, "registered workflow");
        }
        Ok(())
    }

    /// Make an inline template available to template steps by name
    pub async fn register_template(&self, template: TemplateDefinition) -> Result<()> {
        template.validate()?;
        tracing::debug!(template = %template.name, "registered inline template");
        self.templates.insert(template).await;
        Ok(())
    }

    /// Parse a YAML workflow and register it, returning its name
    pub async fn load_yaml_str(&self, yaml: &str) -> Result<String> {
        let workflow = WorkflowDefinition::from_yaml_str(yaml)?;
        let name = workflow.name.clone();
        self.register_workflow(workflow).await?;
        Ok(name)
    }

    /// Read a YAML workflow from disk and register it, returning its name
    pub async fn load_yaml_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let yaml = tokio::fs::read_to_string(path.as_ref()).await?;
        self.load_yaml_str(&yaml).await
    }

    /// Run a registered workflow to completion
    ///
    /// The sink belongs to this run alone; dropping it after the call is
    /// all the cleanup there is, on success and failure alike.
    pub async fn run_workflow(
        &self,
        name: &str,
        initial_input: Map<String, Value>,
        sink: &EventSink,
    ) -> Result<HashMap<String, StoredValue>> {
        let workflow = {
            let workflows = self.workflows.read().await;
            workflows
                .get(name)
                .cloned()
                .ok_or_else(|| WorkflowError::WorkflowNotFound {
                    name: name.to_string(),
                })?
        };

        let executor = WorkflowExecutor::new(Arc::clone(&self.registry))
            .with_providers(self.providers.clone())
            .with_templates(Arc::clone(&self.templates));
        let executor = match &self.auth_config {
            Some(auth) => executor.with_auth_config(auth.clone()),
            None => executor,
        };

        executor.execute(&workflow, initial_input, sink).await
    }

    /// Names of all registered workflows, sorted
    pub async fn workflow_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// True when a workflow is registered under `name`
    pub async fn has_workflow(&self, name: &str) -> bool {
        self.workflows.read().await.contains_key(name)
    }

    /// The tool registry runs resolve against
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The shared template store
    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Names of all configured providers, sorted
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for WorkflowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowManager")
            .field("tools", &self.registry.len())
            .field("providers", &self.provider_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::StaticTemplateLoader;
    use crate::tool::{Tool, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool {
        definition: ToolDefinition,
    }

    impl EchoTool {
        fn new(name: &str) -> Self {
            Self {
                definition: ToolDefinition::new(name, "echoes input", json!({"type": "object"})),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn invoke(&self, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    fn manager_with_echo() -> WorkflowManager {
        let mut registry = ToolRegistry::new();
        registry.register_instance(Arc::new(EchoTool::new("echo")));
        WorkflowManager::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_tool() {
        let manager = manager_with_echo();
        let err = manager
            .load_yaml_str("name: bad\nsteps:\n  - tool: ghost\n    output: r\n")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::ToolNotFound { .. }));
        assert!(!manager.has_workflow("bad").await);
    }

    #[tokio::test]
    async fn test_register_prefetches_template_urls() {
        let mut registry = ToolRegistry::new();
        registry.register_instance(Arc::new(EchoTool::new("echo")));

        let url = "https://templates.example/summarize.yaml";
        let loader = StaticTemplateLoader::new()
            .with_template(url, TemplateDefinition::new("summarize", "{{text}}"));
        let manager = WorkflowManager::new(Arc::new(registry))
            .with_template_loader(Arc::new(loader));

        manager
            .load_yaml_str(&format!(
                "name: remote\nsteps:\n  - templateUrl: {}\n    output: r\n",
                url
            ))
            .await
            .unwrap();

        assert!(manager.templates().is_cached(url).await);
    }

    #[tokio::test]
    async fn test_register_aborts_on_unreachable_template() {
        let manager = WorkflowManager::new(Arc::new(ToolRegistry::new()))
            .with_template_loader(Arc::new(StaticTemplateLoader::new()));

        let err = manager
            .load_yaml_str("name: broken\nsteps:\n  - templateUrl: https://x/t.yaml\n    output: r\n")
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::TemplateFetch { .. }));
        assert!(!manager.has_workflow("broken").await);
    }

    #[tokio::test]
    async fn test_run_unknown_workflow() {
        let manager = manager_with_echo();
        let err = manager
            .run_workflow("ghost", Map::new(), &EventSink::null())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::WorkflowNotFound { .. }));
        assert_eq!(err.to_string(), "workflow not found: 'ghost'");
    }

    #[tokio::test]
    async fn test_load_and_run_round_trip() {
        let manager = manager_with_echo();
        let name = manager
            .load_yaml_str(
                "name: ping\nsteps:\n  - tool: echo\n    input:\n      msg: hi\n    output: r\n",
            )
            .await
            .unwrap();
        assert_eq!(name, "ping");
        assert_eq!(manager.workflow_names().await, vec!["ping"]);

        let results = manager
            .run_workflow("ping", Map::new(), &EventSink::null())
            .await
            .unwrap();
        let step = results["r"].as_step().unwrap();
        assert_eq!(step.output_variables, json!({"msg": "hi"}));
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let manager = manager_with_echo();
        manager
            .load_yaml_str("name: w\nsteps:\n  - tool: echo\n    input:\n      v: one\n    output: r\n")
            .await
            .unwrap();
        manager
            .load_yaml_str("name: w\nsteps:\n  - tool: echo\n    input:\n      v: two\n    output: r\n")
            .await
            .unwrap();

        let results = manager
            .run_workflow("w", Map::new(), &EventSink::null())
            .await
            .unwrap();
        assert_eq!(
            results["r"].as_step().unwrap().output_variables,
            json!({"v": "two"})
        );
        assert_eq!(manager.workflow_names().await.len(), 1);
    }
}
