//! Filesystem scope for file tools.
//!
//! Outside a sandbox, paths resolve against the workspace root and may go
//! anywhere. Inside one, they must stay under the sandbox root, and writes
//! are refused when the workspace is mounted read-only. Symlinks already on
//! disk are followed when checking containment, so a link that points out of
//! the sandbox is refused too. All checks happen before the tool's own I/O.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use toolgate_config::{SandboxPolicy, WorkspaceAccess};
use toolgate_types::ToolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsScope {
    root: PathBuf,
    confined: bool,
    writable: bool,
}

impl FsScope {
    /// Unrestricted scope rooted at `root`.
    pub fn open(root: PathBuf) -> Self {
        Self {
            root: normalize_lexically(&root),
            confined: false,
            writable: true,
        }
    }

    /// Scope for a session, given its workspace and sandbox state.
    pub fn for_session(workspace: &Path, sandbox: Option<&SandboxPolicy>) -> Self {
        let Some(sandbox) = sandbox.filter(|s| s.enabled) else {
            return Self::open(workspace.to_path_buf());
        };
        let root = match sandbox.workspace_access {
            WorkspaceAccess::None => sandbox
                .workspace_root
                .clone()
                .map(|p| if p.is_absolute() { p } else { workspace.join(p) })
                .unwrap_or_else(|| workspace.join(".sandbox")),
            WorkspaceAccess::Ro | WorkspaceAccess::Rw => workspace.to_path_buf(),
        };
        Self {
            root: normalize_lexically(&root),
            confined: true,
            writable: sandbox.workspace_access != WorkspaceAccess::Ro,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_confined(&self) -> bool {
        self.confined
    }

    /// Resolve a path for reading.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid("path", "must be a non-empty string"));
        }
        let candidate = Path::new(trimmed);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let resolved = normalize_lexically(&joined);
        if self.confined && !self.contains(&resolved) {
            return Err(ToolError::SandboxViolation(raw.to_string()));
        }
        Ok(resolved)
    }

    /// True when `path` stays under the root both lexically and after
    /// following any symlinks that already exist along it.
    fn contains(&self, path: &Path) -> bool {
        if !path.starts_with(&self.root) {
            return false;
        }
        let real_root = real_prefix(&self.root).unwrap_or_else(|| self.root.clone());
        real_prefix(path).is_some_and(|real| real.starts_with(&real_root))
    }

    /// Resolve a path that is about to be created, modified, or deleted.
    pub fn resolve_for_write(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let resolved = self.resolve(raw)?;
        if !self.writable {
            return Err(ToolError::ReadOnlyWorkspace(raw.to_string()));
        }
        Ok(resolved)
    }
}

/// Canonicalize the longest existing prefix of `path` and re-append the
/// missing tail. `None` when a missing component is a dangling symlink,
/// since creating through it would land wherever the link points.
fn real_prefix(path: &Path) -> Option<PathBuf> {
    let mut tail: Vec<&OsStr> = Vec::new();
    let mut current = path;
    loop {
        if let Ok(real) = std::fs::canonicalize(current) {
            let mut out = real;
            out.extend(tail.iter().rev());
            return Some(out);
        }
        if std::fs::symlink_metadata(current).is_ok_and(|m| m.file_type().is_symlink()) {
            return None;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                current = parent;
            }
            _ => return Some(path.to_path_buf()),
        }
    }
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
