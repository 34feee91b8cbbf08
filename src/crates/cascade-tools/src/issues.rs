//! Issue tracker tool (Jira-style REST).
//!
//! Supports two actions: `create` files a new issue, `comment` adds a
//! comment to an existing one. The tool declares `reference_key = "key"`,
//! so a later step writing `$created_issue` receives the issue key string
//! (e.g. `"OPS-314"`) rather than the whole result object.
//!
//! # Example step
//!
//! ```yaml
//! - tool: issue_tracker
//!   input:
//!     config:
//!       baseUrl: https://example.atlassian.net
//!       project: OPS
//!     action: create
//!     summary: "{{alert_title}}"
//!     body: "$triage_summary"
//!   output: created_issue
//! ```

use crate::config::{parse_config, parse_input, AuthConfig};
use async_trait::async_trait;
use cascade_core::{Result, Tool, ToolDefinition, ToolEntry, WorkflowError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const NAME: &str = "issue_tracker";

/// Registry entry for the `issue_tracker` tool.
pub fn entry() -> ToolEntry {
    ToolEntry::factory(definition(), |config| {
        Ok(Arc::new(IssueTrackerTool::from_config(config)?) as Arc<dyn Tool>)
    })
}

fn definition() -> ToolDefinition {
    ToolDefinition::new(
        NAME,
        "Create issues and comments in a Jira-style tracker",
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["create", "comment"] },
                "summary": { "type": "string", "description": "Issue summary (create)" },
                "body": { "type": "string", "description": "Issue description or comment text" },
                "issueKey": { "type": "string", "description": "Target issue (comment)" },
                "issueType": { "type": "string", "description": "Issue type name; defaults to Task" }
            },
            "required": ["action"]
        }),
    )
    .with_reference_key("key")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IssueConfig {
    base_url: Option<String>,
    project: Option<String>,
    auth_config: AuthConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueInput {
    action: String,
    summary: Option<String>,
    body: Option<String>,
    #[serde(alias = "issue_key")]
    issue_key: Option<String>,
    issue_type: Option<String>,
}

#[derive(Debug)]
struct IssueTrackerTool {
    definition: ToolDefinition,
    client: Client,
    base_url: String,
    project: Option<String>,
    auth: AuthConfig,
}

impl IssueTrackerTool {
    fn from_config(config: Value) -> Result<Self> {
        let config: IssueConfig = parse_config(NAME, config)?;
        let base_url = config.base_url.ok_or_else(|| {
            WorkflowError::Configuration(format!("tool '{}' config: baseUrl is required", NAME))
        })?;

        Ok(Self {
            definition: definition(),
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project: config.project,
            auth: config.auth_config,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.auth.email, &self.auth.token) {
            (Some(email), Some(token)) => request.basic_auth(email, Some(token)),
            (None, Some(token)) => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value> {
        let request = self.authorize(self.client.post(url)).json(&body);
        let response = request
            .send()
            .await
            .map_err(|e| WorkflowError::tool_failed(NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WorkflowError::tool_failed(
                NAME,
                format!("tracker returned {}: {}", status, text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| WorkflowError::tool_failed(NAME, format!("invalid tracker response: {}", e)))
    }

    async fn create(&self, input: &IssueInput) -> Result<Value> {
        let summary = input.summary.as_deref().ok_or_else(|| {
            WorkflowError::ToolValidation {
                tool: NAME.to_string(),
                error: "action 'create' requires 'summary'".to_string(),
            }
        })?;

        let mut fields = json!({
            "summary": summary,
            "issuetype": { "name": input.issue_type.as_deref().unwrap_or("Task") },
        });
        if let Some(project) = &self.project {
            fields["project"] = json!({ "key": project });
        }
        if let Some(body) = &input.body {
            fields["description"] = json!(body);
        }

        let url = format!("{}/rest/api/2/issue", self.base_url);
        let created: CreatedIssue =
            serde_json::from_value(self.post(&url, json!({ "fields": fields })).await?).map_err(
                |e| WorkflowError::tool_failed(NAME, format!("invalid tracker response: {}", e)),
            )?;

        tracing::info!(key = %created.key, "issue created");
        Ok(json!({
            "key": created.key,
            "id": created.id,
            "url": format!("{}/browse/{}", self.base_url, created.key),
        }))
    }

    async fn comment(&self, input: &IssueInput) -> Result<Value> {
        let issue_key = input.issue_key.as_deref().ok_or_else(|| {
            WorkflowError::ToolValidation {
                tool: NAME.to_string(),
                error: "action 'comment' requires 'issueKey'".to_string(),
            }
        })?;
        let body = input.body.as_deref().ok_or_else(|| WorkflowError::ToolValidation {
            tool: NAME.to_string(),
            error: "action 'comment' requires 'body'".to_string(),
        })?;

        let url = format!("{}/rest/api/2/issue/{}/comment", self.base_url, issue_key);
        let posted = self.post(&url, json!({ "body": body })).await?;

        Ok(json!({
            "key": issue_key,
            "id": posted.get("id").cloned().unwrap_or(Value::Null),
        }))
    }
}

#[async_trait]
impl Tool for IssueTrackerTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let input: IssueInput = parse_input(NAME, input)?;

        match input.action.as_str() {
            "create" => self.create(&input).await,
            "comment" => self.comment(&input).await,
            other => Err(WorkflowError::ToolValidation {
                tool: NAME.to_string(),
                error: format!("unknown action '{}', expected 'create' or 'comment'", other),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    id: Value,
    key: String,
}
