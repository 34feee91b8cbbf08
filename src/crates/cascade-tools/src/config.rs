//! Construction-config plumbing shared by the built-in tools.
//!
//! Factory tools receive a merged config object at dispatch time: the step's
//! resolved `config` input with the engine's auth configuration under
//! `authConfig`. Each tool deserializes the keys it cares about and ignores
//! the rest.

use cascade_core::{Result, WorkflowError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Credentials forwarded by the engine under the `authConfig` key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// API token or webhook secret.
    pub token: Option<String>,
    /// Account email, for APIs using basic auth pairs.
    pub email: Option<String>,
}

/// Deserialize a tool's construction config.
///
/// `null` or a missing object deserializes to the config's defaults;
/// anything unparseable is a configuration error naming the tool.
pub(crate) fn parse_config<T>(tool: &str, config: Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }

    serde_json::from_value(config).map_err(|e| {
        WorkflowError::Configuration(format!("tool '{}' config: {}", tool, e))
    })
}

/// Deserialize a tool's resolved input object.
pub(crate) fn parse_input<T>(tool: &str, input: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(input).map_err(|e| WorkflowError::ToolValidation {
        tool: tool.to_string(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct Probe {
        base_url: Option<String>,
        auth_config: AuthConfig,
    }

    #[test]
    fn test_null_config_is_defaults() {
        let probe: Probe = parse_config("probe", Value::Null).unwrap();
        assert!(probe.base_url.is_none());
        assert!(probe.auth_config.token.is_none());
    }

    #[test]
    fn test_auth_config_rides_under_camel_case_key() {
        let probe: Probe = parse_config(
            "probe",
            json!({"baseUrl": "https://x", "authConfig": {"token": "t", "email": "e@x"}}),
        )
        .unwrap();

        assert_eq!(probe.base_url.as_deref(), Some("https://x"));
        assert_eq!(probe.auth_config.token.as_deref(), Some("t"));
        assert_eq!(probe.auth_config.email.as_deref(), Some("e@x"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let probe: Probe = parse_config("probe", json!({"somethingElse": 1})).unwrap();
        assert!(probe.base_url.is_none());
    }

    #[test]
    fn test_bad_config_names_the_tool() {
        let err = parse_config::<Probe>("probe", json!({"baseUrl": 42})).unwrap_err();
        assert!(err.to_string().contains("tool 'probe' config"));
    }
}
