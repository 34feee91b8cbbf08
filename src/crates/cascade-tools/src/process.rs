//! Local command runner tool.
//!
//! Spawns a process with `tokio::process::Command`, optionally piping stdin,
//! and captures the exit status with both output streams. A non-zero exit is
//! reported in the output (`success: false`), not as a tool error, so
//! workflows can branch on it downstream.

use crate::config::{parse_config, parse_input};
use async_trait::async_trait;
use cascade_core::{Result, Tool, ToolDefinition, ToolEntry, WorkflowError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const NAME: &str = "run_command";

/// Registry entry for the `run_command` tool.
pub fn entry() -> ToolEntry {
    ToolEntry::factory(definition(), |config| {
        let config: ProcessConfig = parse_config(NAME, config)?;
        Ok(Arc::new(RunCommandTool {
            definition: definition(),
            working_dir: config.working_dir,
            env: config.env.unwrap_or_default(),
        }) as Arc<dyn Tool>)
    })
}

fn definition() -> ToolDefinition {
    ToolDefinition::new(
        NAME,
        "Run a local command and capture its output",
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Program to run" },
                "args": { "type": "array", "items": { "type": "string" } },
                "stdin": { "type": "string", "description": "Text piped to the process" },
                "env": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Extra environment variables"
                }
            },
            "required": ["command"]
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProcessConfig {
    working_dir: Option<String>,
    env: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct ProcessInput {
    command: String,
    args: Option<Vec<String>>,
    stdin: Option<String>,
    env: Option<HashMap<String, String>>,
}

struct RunCommandTool {
    definition: ToolDefinition,
    working_dir: Option<String>,
    env: HashMap<String, String>,
}

#[async_trait]
impl Tool for RunCommandTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let input: ProcessInput = parse_input(NAME, input)?;

        let mut cmd = Command::new(&input.command);
        cmd.args(input.args.as_deref().unwrap_or_default())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(env) = &input.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        tracing::debug!(command = %input.command, "spawning command");
        let output = match &input.stdin {
            Some(stdin_text) => {
                cmd.stdin(Stdio::piped());
                let mut child = cmd.spawn().map_err(|e| {
                    WorkflowError::tool_failed(NAME, format!("spawn {}: {}", input.command, e))
                })?;

                if let Some(mut handle) = child.stdin.take() {
                    handle.write_all(stdin_text.as_bytes()).await.map_err(|e| {
                        WorkflowError::tool_failed(NAME, format!("write stdin: {}", e))
                    })?;
                }
                // stdin handle dropped here; the child sees EOF.
                child.wait_with_output().await.map_err(|e| {
                    WorkflowError::tool_failed(NAME, format!("wait {}: {}", input.command, e))
                })?
            }
            None => {
                cmd.stdin(Stdio::null());
                cmd.output().await.map_err(|e| {
                    WorkflowError::tool_failed(NAME, format!("spawn {}: {}", input.command, e))
                })?
            }
        };

        Ok(json!({
            "status": output.status.code().unwrap_or(-1),
            "success": output.status.success(),
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(config: Value) -> Arc<dyn Tool> {
        entry().instantiate(config).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_and_exit() {
        let out = tool(Value::Null)
            .invoke(json!({"command": "echo", "args": ["hello"]}))
            .await
            .unwrap();

        assert_eq!(out["status"], json!(0));
        assert_eq!(out["success"], json!(true));
        assert_eq!(out["stdout"], json!("hello\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let out = tool(Value::Null)
            .invoke(json!({"command": "sh", "args": ["-c", "echo oops >&2; exit 3"]}))
            .await
            .unwrap();

        assert_eq!(out["status"], json!(3));
        assert_eq!(out["success"], json!(false));
        assert_eq!(out["stderr"], json!("oops\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_is_piped() {
        let out = tool(Value::Null)
            .invoke(json!({"command": "cat", "stdin": "piped text"}))
            .await
            .unwrap();

        assert_eq!(out["stdout"], json!("piped text"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_merges_config_and_input() {
        let out = tool(json!({"env": {"FROM_CONFIG": "a"}}))
            .invoke(json!({
                "command": "sh",
                "args": ["-c", "printf '%s-%s' \"$FROM_CONFIG\" \"$FROM_INPUT\""],
                "env": {"FROM_INPUT": "b"}
            }))
            .await
            .unwrap();

        assert_eq!(out["stdout"], json!("a-b"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_working_dir_applies() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(json!({"workingDir": dir.path().display().to_string()}))
            .invoke(json!({"command": "pwd"}))
            .await
            .unwrap();

        let stdout = out["stdout"].as_str().unwrap().trim().to_string();
        // Canonicalize both sides; tempdirs may sit behind symlinks.
        assert_eq!(
            std::fs::canonicalize(stdout).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_a_tool_failure() {
        let err = tool(Value::Null)
            .invoke(json!({"command": "definitely-not-a-real-binary-cascade"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tool 'run_command' failed"));
    }
}
