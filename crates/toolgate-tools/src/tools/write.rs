//! `write` tool: create or overwrite a file.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolgate_types::{AgentTool, AgentToolResult, SchemaNode, ToolDefinition, ToolError, required_str};

use crate::sandbox::FsScope;

pub struct WriteTool {
    scope: FsScope,
    definition: ToolDefinition,
}

impl WriteTool {
    pub fn new(scope: FsScope) -> Self {
        let definition = ToolDefinition {
            name: "write".to_string(),
            description: "Write content to a file, creating parent directories as needed. \
                          Overwrites existing files."
                .to_string(),
            parameters: SchemaNode::object(
                [
                    (
                        "path",
                        SchemaNode::string("Path to the file, relative to the workspace."),
                    ),
                    ("content", SchemaNode::string("Full file contents to write.")),
                ],
                &["path", "content"],
            ),
        };
        Self { scope, definition }
    }
}

#[async_trait]
impl AgentTool for WriteTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _request_id: &str,
        params: Value,
        _cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        let raw_path = required_str(&params, "path")?;
        let content = required_str(&params, "content")?;
        let path = self.scope.resolve_for_write(raw_path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        Ok(AgentToolResult::text(format!(
            "Wrote {} bytes to {raw_path}",
            content.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolgate_config::{SandboxPolicy, WorkspaceAccess};

    #[tokio::test]
    async fn test_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteTool::new(FsScope::open(dir.path().to_path_buf()));
        let result = tool
            .execute(
                "w1",
                json!({ "path": "a/b/c.txt", "content": "hello" }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.joined_text(), "Wrote 5 bytes to a/b/c.txt");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_read_only_sandbox_rejects_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let policy = SandboxPolicy {
            enabled: true,
            workspace_access: WorkspaceAccess::Ro,
            ..Default::default()
        };
        let tool = WriteTool::new(FsScope::for_session(dir.path(), Some(&policy)));
        let err = tool
            .execute(
                "w1",
                json!({ "path": "new/file.txt", "content": "x" }),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ReadOnlyWorkspace(_)));
        assert!(!dir.path().join("new").exists());
    }

    #[tokio::test]
    async fn test_sandbox_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let policy = SandboxPolicy {
            enabled: true,
            workspace_access: WorkspaceAccess::Rw,
            ..Default::default()
        };
        let tool = WriteTool::new(FsScope::for_session(dir.path(), Some(&policy)));
        let err = tool
            .execute(
                "w1",
                json!({ "path": "../outside.txt", "content": "x" }),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_sandbox_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let policy = SandboxPolicy {
            enabled: true,
            workspace_access: WorkspaceAccess::Rw,
            ..Default::default()
        };
        let tool = WriteTool::new(FsScope::for_session(dir.path(), Some(&policy)));
        let err = tool
            .execute(
                "w1",
                json!({ "path": "link/pwned.txt", "content": "x" }),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
        assert!(!outside.path().join("pwned.txt").exists());
    }
}
