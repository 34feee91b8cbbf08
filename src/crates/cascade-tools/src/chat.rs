//! Chat webhook tool.
//!
//! Posts a message to a Slack-style incoming webhook. The webhook URL comes
//! from the construction config; an optional bearer token covers services
//! that authenticate webhooks separately.

use crate::config::{parse_config, parse_input, AuthConfig};
use async_trait::async_trait;
use cascade_core::{Result, Tool, ToolDefinition, ToolEntry, WorkflowError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const NAME: &str = "chat_message";

/// Registry entry for the `chat_message` tool.
pub fn entry() -> ToolEntry {
    ToolEntry::factory(definition(), |config| {
        Ok(Arc::new(ChatMessageTool::from_config(config)?) as Arc<dyn Tool>)
    })
}

fn definition() -> ToolDefinition {
    ToolDefinition::new(
        NAME,
        "Post a message to a chat webhook",
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Message text" },
                "channel": { "type": "string", "description": "Channel override, if the service supports one" }
            },
            "required": ["text"]
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChatConfig {
    webhook_url: Option<String>,
    auth_config: AuthConfig,
}

#[derive(Debug, Deserialize)]
struct ChatInput {
    text: String,
    channel: Option<String>,
}

struct ChatMessageTool {
    definition: ToolDefinition,
    client: Client,
    webhook_url: String,
    bearer_token: Option<String>,
}

impl ChatMessageTool {
    fn from_config(config: Value) -> Result<Self> {
        let config: ChatConfig = parse_config(NAME, config)?;
        let webhook_url = config.webhook_url.ok_or_else(|| {
            WorkflowError::Configuration(format!("tool '{}' config: webhookUrl is required", NAME))
        })?;

        Ok(Self {
            definition: definition(),
            client: Client::new(),
            webhook_url,
            bearer_token: config.auth_config.token,
        })
    }

    fn payload(input: &ChatInput) -> Value {
        let mut payload = json!({ "text": input.text });
        if let Some(channel) = &input.channel {
            payload["channel"] = json!(channel);
        }
        payload
    }
}

#[async_trait]
impl Tool for ChatMessageTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let input: ChatInput = parse_input(NAME, input)?;

        let mut request = self.client.post(&self.webhook_url).json(&Self::payload(&input));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkflowError::tool_failed(NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WorkflowError::tool_failed(
                NAME,
                format!("webhook returned {}: {}", status, text),
            ));
        }

        Ok(json!({ "ok": true, "status": status.as_u16() }))
    }
}
