//! Tool capability interface and registry
//!
//! Tools are named external capabilities a workflow step can invoke: an
//! issue tracker, a storage service, a chat integration, a local command.
//! The engine sees them through one seam, the [`Tool`] trait, and finds them
//! through a [`ToolRegistry`] keyed by name.
//!
//! Registered entries come in a closed set of two kinds:
//!
//! - [`ToolEntry::Instance`] - a ready, pre-configured tool shared across
//!   invocations.
//! - [`ToolEntry::Factory`] - a constructor invoked per dispatch with the
//!   step's merged construction config (the resolved `config` input plus
//!   the engine's auth configuration).
//!
//! Both expose the same capability surface: a [`ToolDefinition`] and
//! [`ToolEntry::instantiate`].
//!
//! # Example
//!
//! ```rust
//! use cascade_core::tool::{Tool, ToolDefinition, ToolEntry, ToolRegistry};
//! use cascade_core::error::Result;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//!
//! struct Echo {
//!     definition: ToolDefinition,
//! }
//!
//! #[async_trait]
//! impl Tool for Echo {
//!     fn definition(&self) -> &ToolDefinition {
//!         &self.definition
//!     }
//!
//!     async fn invoke(&self, input: Value) -> Result<Value> {
//!         Ok(json!({ "echo": input }))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(ToolEntry::instance(std::sync::Arc::new(Echo {
//!     definition: ToolDefinition::new("echo", "Echo the input back", json!({"type": "object"})),
//! })));
//!
//! assert!(registry.has_tool("echo"));
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, WorkflowError};

/// Static description of a tool
///
/// Carries the registry name, a human description, the JSON Schema for the
/// tool's input object, and the optional result-shape contract
/// (`reference_key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Registry name; also the name workflow steps use
    pub name: String,
    /// Human-readable description, shown by tooling
    pub description: String,
    /// JSON Schema describing the expected input object
    pub input_schema: Value,
    /// Declared result contract: when a later step dereferences this tool's
    /// stored result with `$name`, the resolver extracts this key from the
    /// JSON-encoded response. Issue-tracker style tools declare `"key"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_key: Option<String>,
}

impl ToolDefinition {
    /// Create a definition with no reference key
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            reference_key: None,
        }
    }

    /// Declare the key extracted when this tool's result is `$referenced`
    pub fn with_reference_key(mut self, key: impl Into<String>) -> Self {
        self.reference_key = Some(key.into());
        self
    }

    /// Validate an input value against this tool's schema
    ///
    /// The input must be a JSON object. Full JSON Schema validation requires
    /// the `json-validation` feature; without it only the object check runs.
    pub fn validate_input(&self, input: &Value) -> Result<()> {
        if !input.is_object() {
            return Err(WorkflowError::ToolValidation {
                tool: self.name.clone(),
                error: "input must be an object".to_string(),
            });
        }

        #[cfg(feature = "json-validation")]
        {
            use jsonschema::JSONSchema;

            let compiled =
                JSONSchema::compile(&self.input_schema).map_err(|e| WorkflowError::ToolValidation {
                    tool: self.name.clone(),
                    error: format!("invalid input schema: {}", e),
                })?;

            // Collect messages inside the scope so the borrow of `compiled`
            // ends before we build the error.
            let messages = match compiled.validate(input) {
                Ok(()) => None,
                Err(errors) => Some(
                    errors
                        .map(|e| format!("{}: {}", e.instance_path, e))
                        .collect::<Vec<String>>(),
                ),
            };

            if let Some(messages) = messages {
                return Err(WorkflowError::ToolValidation {
                    tool: self.name.clone(),
                    error: messages.join("; "),
                });
            }
        }

        Ok(())
    }
}

/// The capability interface every tool implements
///
/// Implementations are `Send + Sync` so a single instance can serve
/// concurrent runs. Errors should be returned as
/// [`WorkflowError::ToolFailed`] with the tool's own name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's static definition
    fn definition(&self) -> &ToolDefinition;

    /// Invoke the tool with a resolved input object
    ///
    /// The returned value is the tool's raw structured output; the executor
    /// normalizes it into a step result.
    async fn invoke(&self, input: Value) -> Result<Value>;
}

impl fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.definition().name)
            .finish()
    }
}

/// Constructor for per-invocation tool instances
///
/// Receives the merged construction config: the step's resolved `config`
/// input with the engine's auth configuration under `authConfig`.
pub type ToolFactory = Arc<dyn Fn(Value) -> Result<Arc<dyn Tool>> + Send + Sync>;

/// A registered tool: ready instance or per-invocation factory
///
/// The closed set of tool kinds the registry accepts. Construction config is
/// ignored by `Instance` entries; `Factory` entries receive it on every
/// dispatch.
#[derive(Clone)]
pub enum ToolEntry {
    /// Pre-configured instance, shared across invocations
    Instance(Arc<dyn Tool>),
    /// Constructed per invocation from the merged config
    Factory {
        /// Definition advertised before any instance exists
        definition: ToolDefinition,
        /// Instance constructor
        make: ToolFactory,
    },
}

impl ToolEntry {
    /// Wrap a ready instance
    pub fn instance(tool: Arc<dyn Tool>) -> Self {
        ToolEntry::Instance(tool)
    }

    /// Wrap a factory with its advertised definition
    pub fn factory<F>(definition: ToolDefinition, make: F) -> Self
    where
        F: Fn(Value) -> Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        ToolEntry::Factory {
            definition,
            make: Arc::new(make),
        }
    }

    /// Definition of the registered tool
    pub fn definition(&self) -> &ToolDefinition {
        match self {
            ToolEntry::Instance(tool) => tool.definition(),
            ToolEntry::Factory { definition, .. } => definition,
        }
    }

    /// Produce the instance used for one invocation
    ///
    /// `Instance` entries return the shared instance and ignore the config;
    /// `Factory` entries construct a fresh instance from it.
    pub fn instantiate(&self, config: Value) -> Result<Arc<dyn Tool>> {
        match self {
            ToolEntry::Instance(tool) => Ok(Arc::clone(tool)),
            ToolEntry::Factory { make, .. } => make(config),
        }
    }
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolEntry::Instance(tool) => f
                .debug_tuple("Instance")
                .field(&tool.definition().name)
                .finish(),
            ToolEntry::Factory { definition, .. } => f
                .debug_struct("Factory")
                .field("name", &definition.name)
                .finish(),
        }
    }
}

/// Name-keyed table of registered tools
///
/// Registration under an existing name silently overwrites the previous
/// entry; the most recent registration wins. Lookups never mutate the
/// table, so the registry can sit behind an `Arc` and be shared by the
/// manager and every executor.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool entry under its definition name
    ///
    /// Overwrites any existing entry with the same name.
    pub fn register(&mut self, entry: ToolEntry) {
        let name = entry.definition().name.clone();
        if self.entries.insert(name.clone(), entry).is_some() {
            tracing::debug!(tool = %name, "tool re-registered, previous entry replaced");
        } else {
            tracing::debug!(tool = %name, "tool registered");
        }
    }

    /// Register a ready instance
    pub fn register_instance(&mut self, tool: Arc<dyn Tool>) {
        self.register(ToolEntry::instance(tool));
    }

    /// Register a factory with its advertised definition
    pub fn register_factory<F>(&mut self, definition: ToolDefinition, make: F)
    where
        F: Fn(Value) -> Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        self.register(ToolEntry::factory(definition, make));
    }

    /// Look up a tool entry by name
    ///
    /// Fails with [`WorkflowError::ToolNotFound`] naming the tool.
    pub fn resolve(&self, name: &str) -> Result<&ToolEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| WorkflowError::tool_not_found(name))
    }

    /// True when a tool is registered under `name`
    pub fn has_tool(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered definitions, sorted by name
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        let mut defs: Vec<&ToolDefinition> =
            self.entries.values().map(|e| e.definition()).collect();
        defs.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticTool {
        definition: ToolDefinition,
        reply: Value,
    }

    impl StaticTool {
        fn entry(name: &str, reply: Value) -> ToolEntry {
            ToolEntry::instance(Arc::new(StaticTool {
                definition: ToolDefinition::new(name, "static test tool", json!({"type": "object"})),
                reply,
            }))
        }
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn invoke(&self, _input: Value) -> Result<Value> {
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool::entry("echo", json!({"ok": true})));

        assert!(registry.has_tool("echo"));
        assert_eq!(registry.len(), 1);

        let entry = registry.resolve("echo").unwrap();
        assert_eq!(entry.definition().name, "echo");
    }

    #[test]
    fn test_resolve_unknown_tool_fails() {
        let registry = ToolRegistry::new();
        let err = registry.resolve("missing").unwrap_err();
        assert_eq!(err.to_string(), "tool not found: 'missing'");
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool::entry("echo", json!({"version": 1})));
        registry.register(StaticTool::entry("echo", json!({"version": 2})));

        assert_eq!(registry.len(), 1);

        let tool = registry
            .resolve("echo")
            .unwrap()
            .instantiate(json!({}))
            .unwrap();
        let out = tool.invoke(json!({})).await.unwrap();
        assert_eq!(out["version"], json!(2));
    }

    #[tokio::test]
    async fn test_factory_receives_config() {
        let definition = ToolDefinition::new("configured", "config probe", json!({"type": "object"}));
        let entry = ToolEntry::factory(definition.clone(), move |config| {
            Ok(Arc::new(StaticTool {
                definition: definition.clone(),
                reply: config,
            }) as Arc<dyn Tool>)
        });

        let tool = entry
            .instantiate(json!({"endpoint": "https://example.com", "authConfig": {"token": "t"}}))
            .unwrap();
        let out = tool.invoke(json!({})).await.unwrap();
        assert_eq!(out["endpoint"], json!("https://example.com"));
        assert_eq!(out["authConfig"]["token"], json!("t"));
    }

    #[test]
    fn test_instance_ignores_config() {
        let entry = StaticTool::entry("fixed", json!({}));
        // Arbitrary config must not fail instantiation of a ready instance.
        assert!(entry.instantiate(json!({"anything": 1})).is_ok());
    }

    #[test]
    fn test_validate_input_requires_object() {
        let def = ToolDefinition::new("strict", "strict tool", json!({"type": "object"}));
        assert!(def.validate_input(&json!({"a": 1})).is_ok());

        let err = def.validate_input(&json!("not an object")).unwrap_err();
        assert!(err.to_string().contains("input must be an object"));
    }

    #[cfg(feature = "json-validation")]
    #[test]
    fn test_validate_input_against_schema() {
        let def = ToolDefinition::new(
            "typed",
            "typed tool",
            json!({
                "type": "object",
                "properties": { "count": { "type": "integer" } },
                "required": ["count"]
            }),
        );

        assert!(def.validate_input(&json!({"count": 3})).is_ok());
        assert!(def.validate_input(&json!({"count": "three"})).is_err());
        assert!(def.validate_input(&json!({})).is_err());
    }

    #[test]
    fn test_reference_key_builder() {
        let def = ToolDefinition::new("issue_tracker", "tracker", json!({"type": "object"}))
            .with_reference_key("key");
        assert_eq!(def.reference_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_tool_names_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool::entry("zeta", json!({})));
        registry.register(StaticTool::entry("alpha", json!({})));

        assert_eq!(registry.tool_names(), vec!["alpha", "zeta"]);
    }
}
