//! General-purpose HTTP request tool.
//!
//! Sends one request and captures status, headers, and body. A JSON body in
//! the response is decoded so later steps can dereference fields from it;
//! anything else is stored as text.
//!
//! # Example step
//!
//! ```yaml
//! - tool: http_request
//!   input:
//!     config:
//!       baseUrl: https://api.example.com
//!     method: POST
//!     path: /v1/reports
//!     body:
//!       title: "{{title}}"
//!   output: report_response
//! ```

use crate::config::{parse_config, parse_input, AuthConfig};
use async_trait::async_trait;
use cascade_core::{Result, Tool, ToolDefinition, ToolEntry, WorkflowError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

const NAME: &str = "http_request";

/// Registry entry for the `http_request` tool.
pub fn entry() -> ToolEntry {
    ToolEntry::factory(definition(), |config| {
        Ok(Arc::new(HttpRequestTool::from_config(config)?) as Arc<dyn Tool>)
    })
}

fn definition() -> ToolDefinition {
    ToolDefinition::new(
        NAME,
        "Send an HTTP request and capture status, headers, and body",
        json!({
            "type": "object",
            "properties": {
                "method": { "type": "string", "description": "HTTP method; defaults to GET" },
                "url": { "type": "string", "description": "Absolute request URL" },
                "path": { "type": "string", "description": "Path joined onto the configured baseUrl" },
                "body": { "description": "JSON request body" },
                "headers": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Extra request headers"
                }
            }
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HttpConfig {
    base_url: Option<String>,
    headers: Option<HashMap<String, String>>,
    auth_config: AuthConfig,
}

#[derive(Debug, Deserialize)]
struct HttpInput {
    method: Option<String>,
    url: Option<String>,
    path: Option<String>,
    body: Option<Value>,
    headers: Option<HashMap<String, String>>,
}

struct HttpRequestTool {
    definition: ToolDefinition,
    client: Client,
    base_url: Option<String>,
    default_headers: HashMap<String, String>,
    bearer_token: Option<String>,
}

impl HttpRequestTool {
    fn from_config(config: Value) -> Result<Self> {
        let config: HttpConfig = parse_config(NAME, config)?;

        Ok(Self {
            definition: definition(),
            client: Client::new(),
            base_url: config
                .base_url
                .map(|url| url.trim_end_matches('/').to_string()),
            default_headers: config.headers.unwrap_or_default(),
            bearer_token: config.auth_config.token,
        })
    }

    fn resolve_url(&self, input: &HttpInput) -> Result<String> {
        if let Some(url) = &input.url {
            return Ok(url.clone());
        }
        match (&input.path, &self.base_url) {
            (Some(path), Some(base)) => Ok(format!("{}/{}", base, path.trim_start_matches('/'))),
            (Some(_), None) => Err(WorkflowError::tool_failed(
                NAME,
                "input has 'path' but no baseUrl is configured",
            )),
            (None, _) => Err(WorkflowError::tool_failed(
                NAME,
                "input needs either 'url' or 'path'",
            )),
        }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let input: HttpInput = parse_input(NAME, input)?;

        let url = self.resolve_url(&input)?;
        let method_name = input.method.as_deref().unwrap_or("GET").to_uppercase();
        let method = reqwest::Method::from_bytes(method_name.as_bytes())
            .map_err(|_| WorkflowError::tool_failed(NAME, format!("unsupported method '{}'", method_name)))?;

        let mut request = self.client.request(method, &url);
        for (name, value) in &self.default_headers {
            request = request.header(name, value);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(headers) = &input.headers {
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }
        if let Some(body) = &input.body {
            request = request.json(body);
        }

        tracing::debug!(url = %url, method = %method_name, "sending http request");
        let response = request
            .send()
            .await
            .map_err(|e| WorkflowError::tool_failed(NAME, e.to_string()))?;

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), Value::String(v.to_string())))
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| WorkflowError::tool_failed(NAME, e.to_string()))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "status": status,
            "headers": headers,
            "body": body,
        }))
    }
}
