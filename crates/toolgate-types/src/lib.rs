//! Shared types for toolgate: the tool contract, tool results, and the
//! typed parameter schema tree.

pub mod schema;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use schema::{Combinator, SchemaKind, SchemaNode};

// ──────────────────── Content Types ────────────────────

/// A single block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Image { .. } => None,
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolResult {
    pub content: Vec<ContentBlock>,
    /// Structured details for the caller; never sent to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AgentToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            details: None,
        }
    }

    /// Concatenation of all text blocks.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

// ──────────────────── Tool Types ────────────────────

/// Name, description, and parameter contract of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: SchemaNode,
}

/// Errors raised while executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Path escapes sandbox root: {0}")]
    SandboxViolation(String),
    #[error("Workspace is mounted read-only; refusing to modify {0}")]
    ReadOnlyWorkspace(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tool execution cancelled")]
    Cancelled,
    #[error("Command timed out after {0}s")]
    Timeout(u64),
    #[error("Gateway error: {0}")]
    Gateway(String),
    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A callable, schema-described capability exposed to the model.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    async fn execute(
        &self,
        request_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError>;
}

// ──────────────────── Parameter Helpers ────────────────────

/// Fetch a required string parameter.
pub fn required_str<'a>(params: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::MissingParameter(name.to_string()))
}

pub fn optional_str<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

pub fn optional_u64(params: &Value, name: &str) -> Option<u64> {
    params.get(name).and_then(|v| v.as_u64())
}
