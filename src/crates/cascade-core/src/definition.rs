//! Workflow definition data model and loading
//!
//! A workflow is declared as data (YAML or JSON) and deserialized into
//! [`WorkflowDefinition`] before execution. Each step either invokes a
//! registered tool or runs a prompt template against a provider; step inputs
//! are stored verbatim at load time and only resolved against the execution
//! context when the step runs.
//!
//! # YAML Format
//!
//! ```yaml
//! name: triage-bug
//! description: Summarize a bug report and file an issue
//! defaultProvider: openai
//! steps:
//!   - template: summarize
//!     input:
//!       report: "{{report}}"
//!     output: summary
//!
//!   - tool: issue_tracker
//!     input:
//!       action: create
//!       summary: $summary
//!       config:
//!         project: BUG
//!     output:
//!       issue: key
//! ```
//!
//! The first step stores its whole result under `summary`; the second
//! dereferences it with `$summary` and fans out the `key` field of its own
//! output into the context name `issue`.
//!
//! # See Also
//!
//! - [`crate::resolver`] - `$reference` / `{{placeholder}}` semantics
//! - [`crate::manager::WorkflowManager`] - registration and validation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Result, WorkflowError};

/// A declarative, sequential workflow
///
/// Holds an ordered list of steps plus the optional default provider used by
/// template steps that do not name their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Unique workflow name, used for registration and run lookup
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fallback provider for template steps without an explicit `provider`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    /// Steps, executed strictly in order
    pub steps: Vec<WorkflowStep>,
}

/// One step of a workflow
///
/// A closed set of step kinds. Deserialization is untagged: a mapping with a
/// `tool` key is a tool step, otherwise it must carry `template` or
/// `templateUrl` and is a template step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowStep {
    /// Invoke a registered tool
    Tool(ToolStep),
    /// Render a prompt template and run it against a provider
    Template(TemplateStep),
}

/// Tool invocation step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStep {
    /// Registry name of the tool to invoke
    pub tool: String,
    /// Declared inputs; values may be `$references` or `{{templates}}`
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Where the step result is stored in the context
    pub output: OutputBinding,
}

/// Template execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStep {
    /// Name of a registered inline template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// URL of a remote template, fetched once and cached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_url: Option<String>,
    /// Provider override for this step; falls back to the workflow default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Declared inputs; values may be `$references` or `{{templates}}`
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Where the step result is stored in the context
    pub output: OutputBinding,
}

/// How a step stores its result in the execution context
///
/// Two addressing modes:
///
/// - `Single("name")` stores the whole [`StepResult`](crate::context::StepResult)
///   under one context name.
/// - `Mapping {local_key: ctx_name}` fans out individual output fields:
///   for each pair, `output_variables[local_key]` is stored under
///   `ctx_name`. A missing local key stores an explicit null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OutputBinding {
    /// Store the whole step result under one name
    Single(String),
    /// Fan individual output fields out into the context
    Mapping(HashMap<String, String>),
}

/// Step kind discriminator, used in events and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Tool,
    Template,
}

impl StepKind {
    /// String form used in events and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Tool => "tool",
            StepKind::Template => "template",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl WorkflowStep {
    /// Declared inputs of this step
    pub fn input(&self) -> &Map<String, Value> {
        match self {
            WorkflowStep::Tool(s) => &s.input,
            WorkflowStep::Template(s) => &s.input,
        }
    }

    /// Output binding of this step
    pub fn output(&self) -> &OutputBinding {
        match self {
            WorkflowStep::Tool(s) => &s.output,
            WorkflowStep::Template(s) => &s.output,
        }
    }

    /// Step kind discriminator
    pub fn kind(&self) -> StepKind {
        match self {
            WorkflowStep::Tool(_) => StepKind::Tool,
            WorkflowStep::Template(_) => StepKind::Template,
        }
    }

    /// Tool name for tool steps
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            WorkflowStep::Tool(s) => Some(&s.tool),
            WorkflowStep::Template(_) => None,
        }
    }
}

impl OutputBinding {
    /// Context names this binding writes to
    pub fn context_names(&self) -> Vec<&str> {
        match self {
            OutputBinding::Single(name) => vec![name.as_str()],
            OutputBinding::Mapping(map) => map.values().map(String::as_str).collect(),
        }
    }

    /// True for the fan-out form
    pub fn is_mapping(&self) -> bool {
        matches!(self, OutputBinding::Mapping(_))
    }
}

impl fmt::Display for OutputBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputBinding::Single(name) => write!(f, "{}", name),
            OutputBinding::Mapping(map) => {
                let mut names: Vec<&str> = map.values().map(String::as_str).collect();
                names.sort_unstable();
                write!(f, "{{{}}}", names.join(", "))
            }
        }
    }
}

impl WorkflowDefinition {
    /// Parse a workflow from a YAML string
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cascade_core::definition::WorkflowDefinition;
    ///
    /// let yaml = r#"
    /// name: greet
    /// steps:
    ///   - tool: chat_message
    ///     input:
    ///       text: "hello {{user}}"
    ///     output: sent
    /// "#;
    ///
    /// let workflow = WorkflowDefinition::from_yaml_str(yaml).unwrap();
    /// assert_eq!(workflow.name, "greet");
    /// assert_eq!(workflow.steps.len(), 1);
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let def: WorkflowDefinition = serde_yaml::from_str(yaml)?;
        def.validate()?;
        Ok(def)
    }

    /// Load and parse a workflow from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse a workflow from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let def: WorkflowDefinition = serde_json::from_str(json)?;
        def.validate()?;
        Ok(def)
    }

    /// Validate the definition structure
    ///
    /// Checks what can be checked without a registry: non-empty name and
    /// step list, a template source on every template step, non-empty
    /// output bindings. Tool availability is checked separately at
    /// registration time, against the live registry.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "workflow name cannot be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                WorkflowStep::Tool(s) => {
                    if s.tool.trim().is_empty() {
                        return Err(WorkflowError::Validation(format!(
                            "step {}: tool name cannot be empty",
                            index
                        )));
                    }
                }
                WorkflowStep::Template(s) => {
                    if s.template.is_none() && s.template_url.is_none() {
                        return Err(WorkflowError::Validation(format!(
                            "step {}: template step has neither 'template' nor 'templateUrl'",
                            index
                        )));
                    }
                }
            }

            match step.output() {
                OutputBinding::Single(name) if name.trim().is_empty() => {
                    return Err(WorkflowError::Validation(format!(
                        "step {}: output name cannot be empty",
                        index
                    )));
                }
                OutputBinding::Mapping(map) if map.is_empty() => {
                    return Err(WorkflowError::Validation(format!(
                        "step {}: output mapping cannot be empty",
                        index
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Tool names referenced by this workflow, in step order
    ///
    /// Duplicates are preserved; registration-time validation checks each
    /// occurrence against the registry.
    pub fn referenced_tools(&self) -> Vec<&str> {
        self.steps.iter().filter_map(|s| s.tool_name()).collect()
    }

    /// Template URLs referenced by this workflow
    pub fn referenced_template_urls(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                WorkflowStep::Template(t) => t.template_url.as_deref(),
                WorkflowStep::Tool(_) => None,
            })
            .collect()
    }
}
