//! Reference and placeholder resolution
//!
//! Declared step inputs are resolved against the execution context just
//! before the step runs. Each declared value is checked in order:
//!
//! 1. **`$reference`** - a string starting with `$` dereferences a stored
//!    result by name. Unknown names are hard errors.
//! 2. **`{{placeholder}}`** - a string containing placeholders has every
//!    occurrence replaced with the matching caller variable, coerced to a
//!    string. Unknown placeholders become the empty string.
//! 3. **literal** - anything else (plain strings, numbers, booleans,
//!    objects, arrays) passes through untouched.
//!
//! Dereferencing a whole step result yields its `response` text, except
//! when the producing tool declared a `reference_key`: then that key is
//! extracted from the JSON-encoded response, falling back to the structured
//! output variables with a warning when the response is not parseable.
//!
//! Resolution is pure over `(declared inputs, context)`; no I/O happens
//! here.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::context::{ExecutionContext, StepResult, StoredValue};
use crate::error::{Result, WorkflowError};

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([\w.\-]+)\s*\}\}").expect("static placeholder pattern is valid")
    })
}

/// Resolve all declared inputs of a step
///
/// Returns a new map with every value resolved; the declared inputs are
/// never mutated. Fails on the first unknown `$reference`.
pub fn resolve_inputs(
    declared: &Map<String, Value>,
    context: &ExecutionContext,
) -> Result<Map<String, Value>> {
    let mut resolved = Map::new();
    for (key, value) in declared {
        resolved.insert(key.clone(), resolve_value(value, context)?);
    }
    Ok(resolved)
}

/// Resolve a single declared value
pub fn resolve_value(value: &Value, context: &ExecutionContext) -> Result<Value> {
    match value {
        Value::String(s) => resolve_string(s, context),
        other => Ok(other.clone()),
    }
}

fn resolve_string(s: &str, context: &ExecutionContext) -> Result<Value> {
    if let Some(name) = s.strip_prefix('$') {
        // A bare "$" is a literal, not a reference.
        if !name.is_empty() {
            return dereference(name, context);
        }
    }

    if s.contains("{{") {
        let substituted = substitute_with(s, |name| context.variable(name).cloned());
        return Ok(Value::String(substituted));
    }

    Ok(Value::String(s.to_string()))
}

/// Dereference a stored result by name
fn dereference(name: &str, context: &ExecutionContext) -> Result<Value> {
    let stored = context
        .result(name)
        .ok_or_else(|| WorkflowError::unknown_reference(name))?;

    match stored {
        StoredValue::Field(value) => Ok(value.clone()),
        StoredValue::Step(result) => {
            if let Some(key) = result
                .produced_by
                .as_ref()
                .and_then(|p| p.reference_key.as_deref())
            {
                return extract_reference_key(name, result, key);
            }
            // Response text takes precedence over structured outputs.
            Ok(Value::String(result.response.clone()))
        }
    }
}

/// Extract a tool-declared key from a stored result
///
/// Preferred path is the JSON-encoded response; the structured output
/// variables are the degraded fallback and are logged as such.
fn extract_reference_key(name: &str, result: &StepResult, key: &str) -> Result<Value> {
    if let Ok(parsed) = serde_json::from_str::<Value>(&result.response) {
        if let Some(value) = parsed.get(key) {
            return Ok(value.clone());
        }
    }

    if let Some(value) = result.output_variables.get(key) {
        tracing::warn!(
            reference = %name,
            key = %key,
            "reference key taken from output variables; response lacked it or was not JSON"
        );
        return Ok(value.clone());
    }

    Err(WorkflowError::MissingReferenceKey {
        reference: name.to_string(),
        key: key.to_string(),
    })
}

/// Replace every `{{name}}` occurrence using the given lookup
///
/// Missing names substitute to the empty string. Shared by input resolution
/// (looking up caller variables) and template rendering (looking up resolved
/// step inputs).
pub fn substitute_with<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<Value>,
{
    placeholder_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match lookup(name) {
                Some(value) => coerce_to_string(&value),
                None => {
                    tracing::debug!(placeholder = %name, "unresolved placeholder, substituting empty string");
                    String::new()
                }
            }
        })
        .into_owned()
}

/// String coercion used by placeholder substitution
///
/// Strings are used verbatim; every other value is rendered as compact
/// JSON.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
