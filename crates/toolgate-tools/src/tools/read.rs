//! `read` tool: read a file from the workspace.
//!
//! Images come back as an image block plus a short description; everything
//! else comes back as text, split into blocks of at most [`MAX_CHUNK_CHARS`].

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolgate_types::{
    AgentTool, AgentToolResult, ContentBlock, SchemaNode, ToolDefinition, ToolError,
    optional_u64, required_str,
};

use crate::sandbox::FsScope;

/// Largest text block returned.
pub const MAX_CHUNK_CHARS: usize = 16 * 1024;

pub struct ReadTool {
    scope: FsScope,
    definition: ToolDefinition,
}

impl ReadTool {
    pub fn new(scope: FsScope) -> Self {
        let definition = ToolDefinition {
            name: "read".to_string(),
            description: "Read the contents of a file. Images are returned as image attachments; \
                          text files can be read in line ranges with offset/limit."
                .to_string(),
            parameters: SchemaNode::object(
                [
                    (
                        "path",
                        SchemaNode::string("Path to the file, relative to the workspace."),
                    ),
                    (
                        "offset",
                        SchemaNode::integer("Line number to start from (1-based)."),
                    ),
                    ("limit", SchemaNode::integer("Maximum number of lines to read.")),
                ],
                &["path"],
            ),
        };
        Self { scope, definition }
    }
}

#[async_trait]
impl AgentTool for ReadTool {
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
        let path = self.scope.resolve(raw_path)?;
        let bytes = tokio::fs::read(&path).await?;

        if let Some(mime_type) = sniff_image_mime(&bytes).or_else(|| mime_from_extension(&path)) {
            let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
            return Ok(AgentToolResult {
                content: vec![
                    ContentBlock::text(format!(
                        "Read image file {raw_path} [{mime_type}, {} bytes]",
                        bytes.len()
                    )),
                    ContentBlock::Image {
                        mime_type: mime_type.to_string(),
                        data,
                    },
                ],
                details: None,
            });
        }

        let text = String::from_utf8_lossy(&bytes);
        let offset = optional_u64(&params, "offset").map(|v| v as usize);
        let limit = optional_u64(&params, "limit").map(|v| v as usize);
        let selected = select_lines(&text, offset, limit);

        Ok(AgentToolResult {
            content: chunk_text(&selected, MAX_CHUNK_CHARS)
                .into_iter()
                .map(ContentBlock::text)
                .collect(),
            details: None,
        })
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Apply a 1-based line offset and a line limit.
fn select_lines(text: &str, offset: Option<usize>, limit: Option<usize>) -> String {
    if offset.is_none() && limit.is_none() {
        return text.to_string();
    }
    let skip = offset.unwrap_or(1).saturating_sub(1);
    text.split_inclusive('\n')
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Split on char boundaries into pieces of at most `max_chars` chars.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    chunks.push(current);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn tool(dir: &Path) -> ReadTool {
        ReadTool::new(FsScope::open(dir.to_path_buf()))
    }

    #[tokio::test]
    async fn test_read_text_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "alpha\nbeta\n").unwrap();

        let result = tool(dir.path())
            .execute("r1", json!({ "path": "notes.txt" }), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.content, vec![ContentBlock::text("alpha\nbeta\n")]);
    }

    #[tokio::test]
    async fn test_read_line_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lines.txt"), "1\n2\n3\n4\n").unwrap();

        let result = tool(dir.path())
            .execute(
                "r1",
                json!({ "path": "lines.txt", "offset": 2, "limit": 2 }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.joined_text(), "2\n3\n");
    }

    #[tokio::test]
    async fn test_large_file_is_chunked_but_complete() {
        let dir = tempfile::tempdir().unwrap();
        let body = "é".repeat(MAX_CHUNK_CHARS + 10);
        std::fs::write(dir.path().join("big.txt"), &body).unwrap();

        let result = tool(dir.path())
            .execute("r1", json!({ "path": "big.txt" }), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.content.len(), 2);
        assert_eq!(result.joined_text(), body);
    }

    #[tokio::test]
    async fn test_read_png_returns_image_block() {
        let dir = tempfile::tempdir().unwrap();
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        std::fs::write(dir.path().join("pixel.png"), png).unwrap();

        let result = tool(dir.path())
            .execute("r1", json!({ "path": "pixel.png" }), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.content.len(), 2);
        assert!(result.content[0].as_text().unwrap().contains("image/png"));
        match &result.content[1] {
            ContentBlock::Image { mime_type, data } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(data, "iVBORw0KGgo=");
            }
            other => panic!("expected image block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path())
            .execute("r1", json!({ "path": "nope.txt" }), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_through_symlink_out_of_sandbox_rejected() {
        use toolgate_config::{SandboxPolicy, WorkspaceAccess};

        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "TOP SECRET").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let policy = SandboxPolicy {
            enabled: true,
            workspace_access: WorkspaceAccess::Ro,
            ..Default::default()
        };
        let err = ReadTool::new(FsScope::for_session(dir.path(), Some(&policy)))
            .execute("r1", json!({ "path": "link/secret.txt" }), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }

    #[test]
    fn test_chunk_text_empty() {
        assert_eq!(chunk_text("", 4), vec![String::new()]);
        assert_eq!(chunk_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(mime_from_extension(&PathBuf::from("a.JPG")), Some("image/jpeg"));
    }
}
