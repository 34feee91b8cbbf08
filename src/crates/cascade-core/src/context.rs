//! Execution context shared across workflow steps
//!
//! Each run owns one [`ExecutionContext`]: the `variables` map seeded from
//! the caller's initial input (read by `{{placeholder}}` substitution) and
//! the `results` map written by step output bindings (read by `$reference`
//! dereferencing).
//!
//! Results are stored in one of two shapes, mirroring the two output
//! binding modes:
//!
//! ```text
//! output: summary            ->  results["summary"] = StoredValue::Step(whole result)
//! output:                    ->  results["issue"]   = StoredValue::Field(outputs["key"])
//!   issue: key                   results["link"]    = StoredValue::Field(outputs["url"])
//!   link: url
//! ```
//!
//! Tool-produced results carry an explicit [`ToolProvenance`] record instead
//! of tagging the variables map; the resolver uses its `reference_key` to
//! unwrap structured tool responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::definition::OutputBinding;
use crate::error::Result;

/// Which tool produced a stored result, and its declared result contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProvenance {
    /// Registry name of the producing tool
    pub tool: String,
    /// The tool's declared reference key, copied from its definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_key: Option<String>,
}

impl ToolProvenance {
    /// Provenance for a tool with no declared reference key
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            reference_key: None,
        }
    }

    /// Provenance carrying the tool's declared reference key
    pub fn with_reference_key(mut self, key: impl Into<String>) -> Self {
        self.reference_key = Some(key.into());
        self
    }
}

/// Normalized result of one executed step
///
/// `response` is always text: the JSON-stringified raw output for tool
/// steps, the final completion text for template steps. `output_variables`
/// keeps the structured form for fan-out bindings and reference-key
/// extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Text form of the step output
    pub response: String,
    /// Structured form of the step output
    pub output_variables: Value,
    /// Set for tool steps; `None` for template steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_by: Option<ToolProvenance>,
}

impl StepResult {
    /// Normalize a tool's raw output
    ///
    /// The raw value is JSON-stringified into `response` and kept verbatim
    /// as `output_variables`.
    pub fn from_tool_output(raw: Value, provenance: ToolProvenance) -> Result<Self> {
        let response = serde_json::to_string(&raw)?;
        Ok(Self {
            response,
            output_variables: raw,
            produced_by: Some(provenance),
        })
    }

    /// Normalize a template execution's text and extracted outputs
    pub fn from_template_output(response: impl Into<String>, output_variables: Value) -> Self {
        Self {
            response: response.into(),
            output_variables,
            produced_by: None,
        }
    }
}

/// A value stored in the results map
///
/// Single-name bindings store the whole step result; mapping bindings store
/// individual output fields. The two shapes resolve differently under
/// `$reference` (see [`crate::resolver`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredValue {
    /// Whole step result from a single-name binding
    Step(StepResult),
    /// One output field from a mapping binding
    Field(Value),
}

impl StoredValue {
    /// The whole step result, when stored as one
    pub fn as_step(&self) -> Option<&StepResult> {
        match self {
            StoredValue::Step(result) => Some(result),
            StoredValue::Field(_) => None,
        }
    }

    /// The bare field value, when stored as one
    pub fn as_field(&self) -> Option<&Value> {
        match self {
            StoredValue::Field(value) => Some(value),
            StoredValue::Step(_) => None,
        }
    }
}

/// Per-run variable and result store
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Caller-supplied variables, read by `{{placeholder}}` substitution
    pub variables: HashMap<String, Value>,
    /// Step outputs, read by `$reference` dereferencing
    pub results: HashMap<String, StoredValue>,
}

impl ExecutionContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with the caller's initial input
    pub fn with_initial_input(input: Map<String, Value>) -> Self {
        Self {
            variables: input.into_iter().collect(),
            results: HashMap::new(),
        }
    }

    /// Look up a caller-supplied variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Look up a stored step result
    pub fn result(&self, name: &str) -> Option<&StoredValue> {
        self.results.get(name)
    }

    /// Store a step result according to its output binding
    ///
    /// Single bindings store the whole result. Mapping bindings fan out:
    /// for each `{local_key: context_name}` pair,
    /// `output_variables[local_key]` is stored under `context_name`. A
    /// local key missing from the outputs stores an explicit null so the
    /// name stays addressable. Re-binding an existing name overwrites it.
    pub fn store_step_result(&mut self, binding: &OutputBinding, result: StepResult) {
        match binding {
            OutputBinding::Single(name) => {
                self.results.insert(name.clone(), StoredValue::Step(result));
            }
            OutputBinding::Mapping(map) => {
                for (local_key, context_name) in map {
                    let value = result
                        .output_variables
                        .get(local_key)
                        .cloned()
                        .unwrap_or(Value::Null);
                    self.results
                        .insert(context_name.clone(), StoredValue::Field(value));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    fn tool_result(raw: Value) -> StepResult {
        StepResult::from_tool_output(raw, ToolProvenance::new("test_tool")).unwrap()
    }

    #[test]
    fn test_initial_input_seeds_variables() {
        let mut input = Map::new();
        input.insert("user".to_string(), json!("ada"));
        input.insert("count".to_string(), json!(2));

        let ctx = ExecutionContext::with_initial_input(input);
        assert_eq!(ctx.variable("user"), Some(&json!("ada")));
        assert_eq!(ctx.variable("count"), Some(&json!(2)));
        assert!(ctx.results.is_empty());
    }

    #[test]
    fn test_tool_output_is_json_stringified() {
        let result = tool_result(json!({"key": "BUG-7", "id": 7}));
        let parsed: Value = serde_json::from_str(&result.response).unwrap();
        assert_eq!(parsed, json!({"key": "BUG-7", "id": 7}));
        assert_eq!(result.produced_by.as_ref().unwrap().tool, "test_tool");
    }

    #[test]
    fn test_single_binding_stores_whole_result() {
        let mut ctx = ExecutionContext::new();
        let binding = OutputBinding::Single("issue".to_string());
        ctx.store_step_result(&binding, tool_result(json!({"key": "BUG-1"})));

        let stored = ctx.result("issue").unwrap().as_step().unwrap();
        assert_eq!(stored.output_variables, json!({"key": "BUG-1"}));
    }

    #[test]
    fn test_mapping_binding_fans_out_fields() {
        let mut ctx = ExecutionContext::new();
        let mut map = StdHashMap::new();
        map.insert("key".to_string(), "issue".to_string());
        map.insert("url".to_string(), "link".to_string());
        let binding = OutputBinding::Mapping(map);

        ctx.store_step_result(
            &binding,
            tool_result(json!({"key": "BUG-2", "url": "https://t/BUG-2", "noise": 1})),
        );

        assert_eq!(ctx.result("issue").unwrap().as_field(), Some(&json!("BUG-2")));
        assert_eq!(
            ctx.result("link").unwrap().as_field(),
            Some(&json!("https://t/BUG-2"))
        );
        assert!(ctx.result("noise").is_none());
    }

    #[test]
    fn test_missing_local_key_stores_null() {
        let mut ctx = ExecutionContext::new();
        let mut map = StdHashMap::new();
        map.insert("nope".to_string(), "absent".to_string());
        let binding = OutputBinding::Mapping(map);

        ctx.store_step_result(&binding, tool_result(json!({"other": 1})));
        assert_eq!(ctx.result("absent").unwrap().as_field(), Some(&Value::Null));
    }

    #[test]
    fn test_fan_out_from_non_object_output_stores_null() {
        let mut ctx = ExecutionContext::new();
        let mut map = StdHashMap::new();
        map.insert("field".to_string(), "x".to_string());
        let binding = OutputBinding::Mapping(map);

        ctx.store_step_result(&binding, tool_result(json!(["a", "b"])));
        assert_eq!(ctx.result("x").unwrap().as_field(), Some(&Value::Null));
    }

    #[test]
    fn test_rebinding_overwrites() {
        let mut ctx = ExecutionContext::new();
        let binding = OutputBinding::Single("out".to_string());

        ctx.store_step_result(&binding, tool_result(json!({"v": 1})));
        ctx.store_step_result(&binding, tool_result(json!({"v": 2})));

        let stored = ctx.result("out").unwrap().as_step().unwrap();
        assert_eq!(stored.output_variables, json!({"v": 2}));
    }

    #[test]
    fn test_template_result_has_no_provenance() {
        let result = StepResult::from_template_output("fine text", json!({"summary": "fine text"}));
        assert!(result.produced_by.is_none());
        assert_eq!(result.response, "fine text");
    }

    #[test]
    fn test_stored_value_serializes_flat() {
        let stored = StoredValue::Field(json!("BUG-3"));
        assert_eq!(serde_json::to_value(&stored).unwrap(), json!("BUG-3"));

        let step = StoredValue::Step(StepResult::from_template_output("t", json!({})));
        let v = serde_json::to_value(&step).unwrap();
        assert_eq!(v["response"], json!("t"));
        assert_eq!(v["outputVariables"], json!({}));
    }
}
