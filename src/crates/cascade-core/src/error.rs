//! Error types and error handling for workflow operations
//!
//! This module defines all errors that can occur while loading, validating,
//! and executing workflows. All errors implement `std::error::Error` via the
//! `thiserror` crate.
//!
//! # Error Hierarchy
//!
//! ```text
//! WorkflowError
//! ├── Validation         - Definition structure errors
//! ├── WorkflowNotFound   - Unknown workflow name at run time
//! ├── ToolNotFound       - Unknown tool name (load or dispatch time)
//! ├── ToolValidation     - Tool input rejected by its schema
//! ├── ToolFailed         - Tool invocation failures
//! ├── ProviderNotFound   - No usable provider for a template step
//! ├── Provider           - Provider/client failures
//! ├── TemplateNotFound   - Template step without a resolvable template
//! ├── TemplateFetch      - Remote template retrieval failures
//! ├── UnknownReference   - $reference to a name with no stored result
//! ├── MissingReferenceKey- Declared result key absent from a tool response
//! ├── StepExecution      - Step failure with step index context
//! ├── Serialization      - JSON errors
//! ├── Yaml               - YAML errors
//! ├── Http               - HTTP transport errors
//! ├── Io                 - Filesystem errors
//! └── Configuration      - Engine configuration errors
//! ```
//!
//! # Error Handling Patterns
//!
//! ```rust
//! use cascade_core::error::{Result, WorkflowError};
//!
//! fn check_name(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(WorkflowError::Validation(
//!             "workflow name cannot be empty".to_string(),
//!         ));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Matching specific errors:
//!
//! ```rust
//! use cascade_core::error::WorkflowError;
//!
//! fn describe(err: &WorkflowError) -> String {
//!     match err {
//!         WorkflowError::ToolNotFound { tool } => {
//!             format!("register '{}' before running", tool)
//!         }
//!         WorkflowError::StepExecution { step, error } => {
//!             format!("fix step {}: {}", step, error)
//!         }
//!         other => other.to_string(),
//!     }
//! }
//! ```

use thiserror::Error;

/// Convenience result type using [`WorkflowError`]
///
/// # Examples
///
/// ```rust
/// use cascade_core::error::{Result, WorkflowError};
///
/// fn parse_target(target: &str) -> Result<&str> {
///     target
///         .strip_prefix("$")
///         .ok_or_else(|| WorkflowError::Validation("expected a $reference".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Comprehensive error type for all workflow operations
///
/// `WorkflowError` covers definition loading, registration-time validation,
/// reference resolution, and step execution. Variants carry enough context
/// (tool name, step index, reference name) for a caller to report the
/// failure without re-deriving it.
///
/// # Error Categories
///
/// - **Loading**: `Validation`, `Yaml`, `Serialization`, `Io`
/// - **Lookup**: `WorkflowNotFound`, `ToolNotFound`, `ProviderNotFound`,
///   `TemplateNotFound`
/// - **Resolution**: `UnknownReference`, `MissingReferenceKey`
/// - **Execution**: `StepExecution`, `ToolValidation`, `ToolFailed`,
///   `Provider`
/// - **Transport**: `Http`, `TemplateFetch`
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Workflow definition failed structural validation
    ///
    /// Occurs when a definition is registered or loaded and its shape is
    /// invalid: empty step list, a template step with neither an inline
    /// template nor a URL, an empty output mapping, or a tool step naming a
    /// tool the registry does not know ("tool factory not found").
    ///
    /// **Recovery**: fix the definition before registering it again.
    #[error("workflow validation failed: {0}")]
    Validation(String),

    /// No workflow registered under the requested name
    #[error("workflow not found: '{name}'")]
    WorkflowNotFound {
        /// The name that was looked up
        name: String,
    },

    /// No tool registered under the requested name
    ///
    /// Raised both by [`ToolRegistry::resolve`](crate::tool::ToolRegistry::resolve)
    /// and by the executor's dispatch-time recheck. The registry is
    /// revalidated on every dispatch because tools can be swapped between
    /// load-time validation and execution.
    #[error("tool not found: '{tool}'")]
    ToolNotFound {
        /// The tool name that was looked up
        tool: String,
    },

    /// Tool input rejected before invocation
    ///
    /// The resolved input was not an object, or (with the `json-validation`
    /// feature) did not satisfy the tool's declared input schema.
    #[error("tool '{tool}' input validation failed: {error}")]
    ToolValidation {
        /// Name of the tool whose input was rejected
        tool: String,
        /// Validation failure details
        error: String,
    },

    /// Tool invocation returned an error
    #[error("tool '{tool}' failed: {error}")]
    ToolFailed {
        /// Name of the failing tool
        tool: String,
        /// Error reported by the tool
        error: String,
    },

    /// No provider available for a template step
    ///
    /// Either the step (and workflow default) named a provider that is not
    /// in the provider map, or neither names one at all.
    #[error("{}", provider.as_ref().map(|p| format!("provider not found: '{}'", p)).unwrap_or_else(|| "no provider configured: step has no provider and workflow has no defaultProvider".to_string()))]
    ProviderNotFound {
        /// The provider name that was looked up, when one was named
        provider: Option<String>,
    },

    /// Provider/client failure while completing or streaming
    ///
    /// Concrete provider crates convert their own error types into this
    /// variant at the crate boundary.
    #[error("provider error: {0}")]
    Provider(String),

    /// Template step has no resolvable template
    ///
    /// The step named neither a registered inline template nor a fetchable
    /// URL, or the named template is missing from the store.
    #[error("no template found for step {step}")]
    TemplateNotFound {
        /// Zero-based index of the offending step
        step: usize,
    },

    /// Fetching a remote template failed
    #[error("failed to fetch template from '{url}': {error}")]
    TemplateFetch {
        /// URL that was requested
        url: String,
        /// Transport or decode failure details
        error: String,
    },

    /// `$reference` to a name with no stored result
    ///
    /// The original engine silently injected an undefined value here;
    /// resolution is now fail-fast so typos surface at the first
    /// dereference. Note the asymmetry: `{{placeholder}}` misses still
    /// substitute to an empty string.
    #[error("unknown reference '${reference}': no stored result under that name")]
    UnknownReference {
        /// Reference name (without the leading `$`)
        reference: String,
    },

    /// A tool-declared reference key was missing from the stored result
    ///
    /// The producing tool declared a `reference_key` but neither the JSON
    /// response nor the output variables contain it.
    #[error("reference '${reference}': declared key '{key}' missing from tool result")]
    MissingReferenceKey {
        /// Reference name (without the leading `$`)
        reference: String,
        /// The declared key that could not be found
        key: String,
    },

    /// Step failure with step index context
    ///
    /// Wraps the underlying failure so callers see which step aborted the
    /// run. The engine is fail-fast: the first `StepExecution` ends the
    /// workflow.
    #[error("step {step} execution failed: {error}")]
    StepExecution {
        /// Zero-based index of the failing step
        step: usize,
        /// Error message from the step
        error: String,
    },

    /// JSON serialization/deserialization error
    ///
    /// Wraps errors from `serde_json::Error`.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    ///
    /// Wraps errors from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport error
    ///
    /// Wraps errors from `reqwest::Error` (template fetching).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O operation failed
    ///
    /// Wraps errors from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Create a tool-not-found error
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cascade_core::error::WorkflowError;
    ///
    /// let err = WorkflowError::tool_not_found("issue_tracker");
    /// assert_eq!(err.to_string(), "tool not found: 'issue_tracker'");
    /// ```
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool failure error with tool context
    pub fn tool_failed(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            error: error.into(),
        }
    }

    /// Create a step execution error with step index context
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cascade_core::error::WorkflowError;
    ///
    /// let err = WorkflowError::step_execution(2, "tool 'chat_message' failed: timeout");
    /// assert_eq!(
    ///     err.to_string(),
    ///     "step 2 execution failed: tool 'chat_message' failed: timeout"
    /// );
    /// ```
    pub fn step_execution(step: usize, error: impl Into<String>) -> Self {
        Self::StepExecution {
            step,
            error: error.into(),
        }
    }

    /// Create an unknown-reference error
    pub fn unknown_reference(reference: impl Into<String>) -> Self {
        Self::UnknownReference {
            reference: reference.into(),
        }
    }

    /// True when this error already carries step index context
    ///
    /// Used by the executor to avoid double-wrapping failures that were
    /// raised inside a step.
    pub fn has_step_context(&self) -> bool {
        matches!(
            self,
            Self::StepExecution { .. } | Self::TemplateNotFound { .. }
        )
    }
}
