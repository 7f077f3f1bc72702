//! `apply_patch` tool: apply a multi-file patch in the
//! `*** Begin Patch` / `*** End Patch` envelope format.
//!
//! Every path in the patch is checked against the filesystem scope before
//! any file is touched.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use toolgate_types::{AgentTool, AgentToolResult, ContentBlock, SchemaNode, ToolDefinition, ToolError, required_str};

use crate::sandbox::FsScope;

const BEGIN_PATCH: &str = "*** Begin Patch";
const END_PATCH: &str = "*** End Patch";
const ADD_FILE: &str = "*** Add File: ";
const DELETE_FILE: &str = "*** Delete File: ";
const UPDATE_FILE: &str = "*** Update File: ";
const MOVE_TO: &str = "*** Move to: ";
const END_OF_FILE: &str = "*** End of File";

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatchHunk {
    Add {
        path: String,
        contents: String,
    },
    Delete {
        path: String,
    },
    Update {
        path: String,
        move_to: Option<String>,
        chunks: Vec<PatchChunk>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PatchChunk {
    old_lines: Vec<String>,
    new_lines: Vec<String>,
}

#[derive(Debug, Default)]
struct PatchSummary {
    added: Vec<String>,
    modified: Vec<String>,
    deleted: Vec<String>,
}

pub struct ApplyPatchTool {
    scope: FsScope,
    definition: ToolDefinition,
}

impl ApplyPatchTool {
    pub fn new(scope: FsScope) -> Self {
        let definition = ToolDefinition {
            name: "apply_patch".to_string(),
            description: "Apply a patch to one or more files. The input must start with \
                          '*** Begin Patch' and end with '*** End Patch', containing \
                          Add File, Delete File, and Update File sections."
                .to_string(),
            parameters: SchemaNode::object(
                [(
                    "input",
                    SchemaNode::string("The full patch text, including the begin/end markers."),
                )],
                &["input"],
            ),
        };
        Self { scope, definition }
    }

    async fn apply(&self, hunks: &[PatchHunk]) -> Result<PatchSummary, ToolError> {
        let mut resolved = Vec::with_capacity(hunks.len());
        for hunk in hunks {
            let (path, move_to) = match hunk {
                PatchHunk::Add { path, .. } | PatchHunk::Delete { path } => (path, None),
                PatchHunk::Update { path, move_to, .. } => (path, move_to.as_ref()),
            };
            let target = self.scope.resolve_for_write(path)?;
            let moved = move_to
                .map(|m| self.scope.resolve_for_write(m))
                .transpose()?;
            resolved.push((target, moved));
        }

        let mut summary = PatchSummary::default();
        for (hunk, (target, moved)) in hunks.iter().zip(resolved) {
            match hunk {
                PatchHunk::Add { path, contents } => {
                    write_with_parents(&target, contents).await?;
                    summary.added.push(path.clone());
                }
                PatchHunk::Delete { path } => {
                    tokio::fs::remove_file(&target).await?;
                    summary.deleted.push(path.clone());
                }
                PatchHunk::Update {
                    path,
                    move_to,
                    chunks,
                } => {
                    let original = tokio::fs::read_to_string(&target).await?;
                    let updated = apply_update_chunks(&original, chunks)
                        .map_err(|e| ToolError::Execution(format!("{path}: {e}")))?;
                    match (moved, move_to) {
                        (Some(dest), Some(dest_name)) => {
                            write_with_parents(&dest, &updated).await?;
                            tokio::fs::remove_file(&target).await?;
                            summary.modified.push(dest_name.clone());
                        }
                        _ => {
                            tokio::fs::write(&target, updated).await?;
                            summary.modified.push(path.clone());
                        }
                    }
                }
            }
        }
        Ok(summary)
    }
}

#[async_trait]
impl AgentTool for ApplyPatchTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _request_id: &str,
        params: Value,
        _cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        let input = required_str(&params, "input")?;
        let hunks = parse_patch_text(input).map_err(|reason| ToolError::invalid("input", reason))?;
        let summary = self.apply(&hunks).await?;

        let mut text = String::from("Success. Updated the following files:\n");
        for path in &summary.added {
            text.push_str(&format!("A {path}\n"));
        }
        for path in &summary.modified {
            text.push_str(&format!("M {path}\n"));
        }
        for path in &summary.deleted {
            text.push_str(&format!("D {path}\n"));
        }

        Ok(AgentToolResult {
            content: vec![ContentBlock::text(text)],
            details: Some(json!({
                "added": summary.added,
                "modified": summary.modified,
                "deleted": summary.deleted,
            })),
        })
    }
}

async fn write_with_parents(path: &Path, contents: &str) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

fn parse_patch_text(input: &str) -> Result<Vec<PatchHunk>, String> {
    let lines: Vec<&str> = input.trim().lines().collect();
    if lines.len() < 2 {
        return Err("patch input must include begin/end markers".into());
    }
    if lines.first().map(|l| l.trim()) != Some(BEGIN_PATCH) {
        return Err(format!("patch must start with `{BEGIN_PATCH}`"));
    }
    if lines.last().map(|l| l.trim()) != Some(END_PATCH) {
        return Err(format!("patch must end with `{END_PATCH}`"));
    }

    let mut hunks = Vec::new();
    let mut idx = 1;
    let end = lines.len() - 1;
    while idx < end {
        let line = lines[idx].trim_end();
        if line.trim().is_empty() {
            idx += 1;
            continue;
        }

        if let Some(path) = line.strip_prefix(ADD_FILE) {
            idx += 1;
            let mut payload = Vec::new();
            while idx < end {
                let Some(content) = lines[idx].strip_prefix('+') else {
                    break;
                };
                payload.push(content);
                idx += 1;
            }
            if payload.is_empty() {
                return Err(format!("add file hunk for `{path}` must include `+` lines"));
            }
            let mut contents = payload.join("\n");
            contents.push('\n');
            hunks.push(PatchHunk::Add {
                path: path.to_string(),
                contents,
            });
        } else if let Some(path) = line.strip_prefix(DELETE_FILE) {
            idx += 1;
            hunks.push(PatchHunk::Delete {
                path: path.to_string(),
            });
        } else if let Some(path) = line.strip_prefix(UPDATE_FILE) {
            idx += 1;
            let mut move_to = None;
            if idx < end {
                if let Some(target) = lines[idx].trim_end().strip_prefix(MOVE_TO) {
                    move_to = Some(target.to_string());
                    idx += 1;
                }
            }
            let chunks = parse_update_chunks(&lines, &mut idx, end)?;
            if chunks.is_empty() {
                return Err(format!("update hunk for `{path}` does not contain any changes"));
            }
            hunks.push(PatchHunk::Update {
                path: path.to_string(),
                move_to,
                chunks,
            });
        } else {
            return Err(format!("invalid patch hunk header: `{line}`"));
        }
    }

    if hunks.is_empty() {
        return Err("patch did not contain any hunks".into());
    }
    Ok(hunks)
}

fn parse_update_chunks(lines: &[&str], idx: &mut usize, end: usize) -> Result<Vec<PatchChunk>, String> {
    let mut chunks = Vec::new();
    while *idx < end {
        let current = lines[*idx].trim_end();
        if current == END_OF_FILE || current.starts_with("@@") || current.is_empty() {
            *idx += 1;
            continue;
        }
        if current.starts_with("*** ") {
            break;
        }

        let mut chunk = PatchChunk {
            old_lines: Vec::new(),
            new_lines: Vec::new(),
        };
        while *idx < end {
            let change = lines[*idx].trim_end();
            if change == END_OF_FILE {
                *idx += 1;
                break;
            }
            if change.starts_with("@@") || change.starts_with("*** ") {
                break;
            }
            if let Some(content) = change.strip_prefix(' ') {
                chunk.old_lines.push(content.to_string());
                chunk.new_lines.push(content.to_string());
            } else if let Some(content) = change.strip_prefix('+') {
                chunk.new_lines.push(content.to_string());
            } else if let Some(content) = change.strip_prefix('-') {
                chunk.old_lines.push(content.to_string());
            } else if change.is_empty() {
                // A blank context line whose leading space was stripped.
                chunk.old_lines.push(String::new());
                chunk.new_lines.push(String::new());
            } else {
                return Err(format!("invalid patch line in update hunk: `{change}`"));
            }
            *idx += 1;
        }

        if chunk.old_lines.is_empty() && chunk.new_lines.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn apply_update_chunks(original: &str, chunks: &[PatchChunk]) -> Result<String, String> {
    let had_trailing_newline = original.ends_with('\n');
    let mut lines: Vec<String> = original.lines().map(ToOwned::to_owned).collect();
    let mut cursor = 0;

    for chunk in chunks {
        let position = if chunk.old_lines.is_empty() {
            Some(cursor.min(lines.len()))
        } else {
            find_subsequence(&lines, &chunk.old_lines, cursor)
                .or_else(|| find_subsequence(&lines, &chunk.old_lines, 0))
        };
        let Some(start) = position else {
            return Err("patch update hunk could not be matched in target file".into());
        };
        let old_len = chunk.old_lines.len();
        lines.splice(start..start + old_len, chunk.new_lines.iter().cloned());
        cursor = start + chunk.new_lines.len();
    }

    let mut rebuilt = lines.join("\n");
    if had_trailing_newline {
        rebuilt.push('\n');
    }
    Ok(rebuilt)
}

fn find_subsequence(haystack: &[String], needle: &[String], start: usize) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    let max_start = haystack.len() - needle.len();
    (start..=max_start).find(|&i| haystack[i..i + needle.len()] == *needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_config::{SandboxPolicy, WorkspaceAccess};

    async fn run(dir: &std::path::Path, patch: &str) -> Result<AgentToolResult, ToolError> {
        ApplyPatchTool::new(FsScope::open(dir.to_path_buf()))
            .execute("p1", json!({ "input": patch }), CancellationToken::new())
            .await
    }

    #[test]
    fn test_parse_all_hunk_kinds() {
        let patch = "*** Begin Patch\n\
                     *** Add File: new.txt\n\
                     +hello\n\
                     *** Delete File: old.txt\n\
                     *** Update File: src/a.rs\n\
                     *** Move to: src/b.rs\n\
                     @@\n\
                     -one\n\
                     +two\n\
                     *** End Patch";
        let hunks = parse_patch_text(patch).unwrap();
        assert_eq!(hunks.len(), 3);
        assert_eq!(
            hunks[0],
            PatchHunk::Add {
                path: "new.txt".into(),
                contents: "hello\n".into()
            }
        );
        assert_eq!(hunks[1], PatchHunk::Delete { path: "old.txt".into() });
        match &hunks[2] {
            PatchHunk::Update { move_to, chunks, .. } => {
                assert_eq!(move_to.as_deref(), Some("src/b.rs"));
                assert_eq!(chunks[0].old_lines, vec!["one"]);
                assert_eq!(chunks[0].new_lines, vec!["two"]);
            }
            other => panic!("expected update hunk, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_envelope() {
        assert!(parse_patch_text("*** Add File: a\n+x").is_err());
        assert!(parse_patch_text("*** Begin Patch\n*** End Patch").is_err());
        assert!(parse_patch_text("*** Begin Patch\n*** Frobnicate: a\n*** End Patch").is_err());
    }

    #[test]
    fn test_update_chunks_keep_trailing_newline() {
        let chunks = vec![PatchChunk {
            old_lines: vec!["b".into()],
            new_lines: vec!["B".into(), "b2".into()],
        }];
        assert_eq!(apply_update_chunks("a\nb\nc\n", &chunks).unwrap(), "a\nB\nb2\nc\n");
        let missing = vec![PatchChunk {
            old_lines: vec!["zzz".into()],
            new_lines: vec![],
        }];
        assert!(apply_update_chunks("a\n", &missing).is_err());
    }

    #[tokio::test]
    async fn test_apply_add_update_delete() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "alpha\nbeta\n").unwrap();
        std::fs::write(dir.path().join("gone.txt"), "bye\n").unwrap();

        let patch = "*** Begin Patch\n\
                     *** Add File: docs/new.md\n\
                     +# Title\n\
                     *** Update File: keep.txt\n\
                     @@\n \
                     alpha\n\
                     -beta\n\
                     +gamma\n\
                     *** Delete File: gone.txt\n\
                     *** End Patch";
        let result = run(dir.path(), patch).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("docs/new.md")).unwrap(),
            "# Title\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(),
            "alpha\ngamma\n"
        );
        assert!(!dir.path().join("gone.txt").exists());
        let text = result.joined_text();
        assert!(text.contains("A docs/new.md"));
        assert!(text.contains("M keep.txt"));
        assert!(text.contains("D gone.txt"));
    }

    #[tokio::test]
    async fn test_apply_move() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x\n").unwrap();
        let patch = "*** Begin Patch\n\
                     *** Update File: a.txt\n\
                     *** Move to: sub/b.txt\n\
                     -x\n\
                     +y\n\
                     *** End Patch";
        run(dir.path(), patch).await.unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("sub/b.txt")).unwrap(), "y\n");
    }

    #[tokio::test]
    async fn test_sandbox_escape_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let policy = SandboxPolicy {
            enabled: true,
            workspace_access: WorkspaceAccess::Rw,
            ..Default::default()
        };
        let tool = ApplyPatchTool::new(FsScope::for_session(dir.path(), Some(&policy)));
        let patch = "*** Begin Patch\n\
                     *** Add File: inside.txt\n\
                     +ok\n\
                     *** Add File: ../outside.txt\n\
                     +nope\n\
                     *** End Patch";
        let err = tool
            .execute("p1", json!({ "input": patch }), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
        assert!(!dir.path().join("inside.txt").exists());
    }

    #[tokio::test]
    async fn test_malformed_patch_is_invalid_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), "not a patch").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { .. }));
    }
}
