//! File read/write tools.
//!
//! Both tools accept a `root` in their construction config. When set, every
//! requested path is resolved inside it and anything escaping it (absolute
//! paths, `..` traversal) is rejected before touching the filesystem.

use crate::config::{parse_config, parse_input};
use async_trait::async_trait;
use cascade_core::{Result, Tool, ToolDefinition, ToolEntry, WorkflowError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const READ_NAME: &str = "file_read";
const WRITE_NAME: &str = "file_write";

/// Registry entry for the `file_read` tool.
pub fn read_entry() -> ToolEntry {
    ToolEntry::factory(read_definition(), |config| {
        let config: FsConfig = parse_config(READ_NAME, config)?;
        Ok(Arc::new(FileReadTool {
            definition: read_definition(),
            root: config.root.map(PathBuf::from),
        }) as Arc<dyn Tool>)
    })
}

/// Registry entry for the `file_write` tool.
pub fn write_entry() -> ToolEntry {
    ToolEntry::factory(write_definition(), |config| {
        let config: FsConfig = parse_config(WRITE_NAME, config)?;
        Ok(Arc::new(FileWriteTool {
            definition: write_definition(),
            root: config.root.map(PathBuf::from),
        }) as Arc<dyn Tool>)
    })
}

fn read_definition() -> ToolDefinition {
    ToolDefinition::new(
        READ_NAME,
        "Read a UTF-8 text file",
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path, relative to the configured root" }
            },
            "required": ["path"]
        }),
    )
}

fn write_definition() -> ToolDefinition {
    ToolDefinition::new(
        WRITE_NAME,
        "Write a UTF-8 text file, creating parent directories",
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path, relative to the configured root" },
                "content": { "type": "string", "description": "File content" }
            },
            "required": ["path", "content"]
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FsConfig {
    root: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadInput {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteInput {
    path: String,
    content: String,
}

/// Resolve a requested path against the confinement root.
///
/// Without a root the path is used as given. With one, the path is joined
/// under it and normalized lexically (the target may not exist yet for
/// writes, so `canonicalize` is not an option); a result outside the root is
/// rejected.
fn resolve_path(tool: &str, root: Option<&Path>, requested: &str) -> Result<PathBuf> {
    let Some(root) = root else {
        return Ok(PathBuf::from(requested));
    };

    let requested_path = Path::new(requested);
    if requested_path.is_absolute() {
        return Err(escape_error(tool, requested));
    }

    let mut resolved = root.to_path_buf();
    for component in requested_path.components() {
        match component {
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(root) {
                    return Err(escape_error(tool, requested));
                }
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }

    if resolved.starts_with(root) {
        Ok(resolved)
    } else {
        Err(escape_error(tool, requested))
    }
}

fn escape_error(tool: &str, requested: &str) -> WorkflowError {
    WorkflowError::tool_failed(
        tool,
        format!("path '{}' escapes the configured root", requested),
    )
}

struct FileReadTool {
    definition: ToolDefinition,
    root: Option<PathBuf>,
}

#[async_trait]
impl Tool for FileReadTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let input: ReadInput = parse_input(READ_NAME, input)?;
        let path = resolve_path(READ_NAME, self.root.as_deref(), &input.path)?;

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            WorkflowError::tool_failed(READ_NAME, format!("read {}: {}", path.display(), e))
        })?;

        Ok(json!({
            "path": path.display().to_string(),
            "content": content,
        }))
    }
}

struct FileWriteTool {
    definition: ToolDefinition,
    root: Option<PathBuf>,
}

#[async_trait]
impl Tool for FileWriteTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let input: WriteInput = parse_input(WRITE_NAME, input)?;
        let path = resolve_path(WRITE_NAME, self.root.as_deref(), &input.path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WorkflowError::tool_failed(WRITE_NAME, format!("mkdir {}: {}", parent.display(), e))
            })?;
        }

        tokio::fs::write(&path, input.content.as_bytes())
            .await
            .map_err(|e| {
                WorkflowError::tool_failed(WRITE_NAME, format!("write {}: {}", path.display(), e))
            })?;

        Ok(json!({
            "path": path.display().to_string(),
            "bytes_written": input.content.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_tool(root: &Path) -> Arc<dyn Tool> {
        read_entry()
            .instantiate(json!({"root": root.display().to_string()}))
            .unwrap()
    }

    fn write_tool(root: &Path) -> Arc<dyn Tool> {
        write_entry()
            .instantiate(json!({"root": root.display().to_string()}))
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let written = write_tool(dir.path())
            .invoke(json!({"path": "notes/hello.txt", "content": "hi there"}))
            .await
            .unwrap();
        assert_eq!(written["bytes_written"], json!(8));

        let read = read_tool(dir.path())
            .invoke(json!({"path": "notes/hello.txt"}))
            .await
            .unwrap();
        assert_eq!(read["content"], json!("hi there"));
    }

    #[tokio::test]
    async fn test_traversal_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let err = read_tool(dir.path())
            .invoke(json!({"path": "../../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("escapes the configured root"));

        let err = write_tool(dir.path())
            .invoke(json!({"path": "/etc/cascade-test", "content": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("escapes the configured root"));
    }

    #[tokio::test]
    async fn test_dotdot_inside_root_is_allowed() {
        let dir = tempfile::tempdir().unwrap();

        write_tool(dir.path())
            .invoke(json!({"path": "a/../b.txt", "content": "ok"}))
            .await
            .unwrap();

        let read = read_tool(dir.path())
            .invoke(json!({"path": "b.txt"}))
            .await
            .unwrap();
        assert_eq!(read["content"], json!("ok"));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_tool_failure() {
        let dir = tempfile::tempdir().unwrap();

        let err = read_tool(dir.path())
            .invoke(json!({"path": "nope.txt"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tool 'file_read' failed"));
    }

    #[tokio::test]
    async fn test_unconfined_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("free.txt");

        let tool = write_entry().instantiate(Value::Null).unwrap();
        tool.invoke(json!({"path": target.display().to_string(), "content": "anywhere"}))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "anywhere");
    }

    #[tokio::test]
    async fn test_missing_required_input_field() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_tool(dir.path())
            .invoke(json!({"path": "x.txt"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("input validation failed"));
    }
}
