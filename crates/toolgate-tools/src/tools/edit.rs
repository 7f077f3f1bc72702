//! `edit` tool: replace one exact occurrence of a text fragment.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolgate_types::{AgentTool, AgentToolResult, SchemaNode, ToolDefinition, ToolError, required_str};

use crate::sandbox::FsScope;

pub struct EditTool {
    scope: FsScope,
    definition: ToolDefinition,
}

impl EditTool {
    pub fn new(scope: FsScope) -> Self {
        let definition = ToolDefinition {
            name: "edit".to_string(),
            description: "Edit a file by replacing exact text. oldText must match exactly once."
                .to_string(),
            parameters: SchemaNode::object(
                [
                    (
                        "path",
                        SchemaNode::string("Path to the file, relative to the workspace."),
                    ),
                    (
                        "oldText",
                        SchemaNode::string("Exact text to find (must be unique in the file)."),
                    ),
                    ("newText", SchemaNode::string("Text to replace it with.")),
                ],
                &["path", "oldText", "newText"],
            ),
        };
        Self { scope, definition }
    }
}

#[async_trait]
impl AgentTool for EditTool {
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
        let old_text = required_str(&params, "oldText")?;
        let new_text = required_str(&params, "newText")?;
        let path = self.scope.resolve_for_write(raw_path)?;

        if old_text.is_empty() {
            return Err(ToolError::invalid("oldText", "must not be empty"));
        }

        let original = tokio::fs::read_to_string(&path).await?;
        match original.matches(old_text).count() {
            0 => {
                return Err(ToolError::Execution(format!(
                    "Could not find the exact text in {raw_path}"
                )));
            }
            1 => {}
            n => {
                return Err(ToolError::Execution(format!(
                    "Found {n} occurrences of the text in {raw_path}; oldText must be unique"
                )));
            }
        }

        let updated = original.replacen(old_text, new_text, 1);
        tokio::fs::write(&path, updated).await?;
        Ok(AgentToolResult::text(format!("Edited {raw_path}")))
    }
}
