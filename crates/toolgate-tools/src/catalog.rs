//! Pre-policy tool catalog.
//!
//! The catalog is a fixed list of `(kind, predicate)` entries. Each entry
//! whose predicate holds for the context is produced fresh; policy filtering
//! happens afterwards in [`crate::policy`].

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use toolgate_types::AgentTool;

use crate::alias::{edit_groups, path_group, with_aliases};
use crate::context::{PolicyContext, ToolHost};
use crate::sandbox::FsScope;
use crate::tools::apply_patch::ApplyPatchTool;
use crate::tools::browser::browser;
use crate::tools::edit::EditTool;
use crate::tools::exec::ExecTool;
use crate::tools::memory::{memory_get, memory_search};
use crate::tools::message::message;
use crate::tools::process::ProcessTool;
use crate::tools::read::ReadTool;
use crate::tools::sessions::{
    session_status, sessions_history, sessions_list, sessions_send, sessions_spawn,
};
use crate::tools::write::WriteTool;

/// Providers whose models edit files through `apply_patch`.
const APPLY_PATCH_PROVIDERS: &[&str] = &["openai", "openai-codex", "azure-openai"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Read,
    Write,
    Edit,
    ApplyPatch,
    Exec,
    Process,
    Browser,
    Message,
    SessionsList,
    SessionsHistory,
    SessionsSend,
    SessionsSpawn,
    SessionStatus,
    MemorySearch,
    MemoryGet,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Read => "read",
            ToolKind::Write => "write",
            ToolKind::Edit => "edit",
            ToolKind::ApplyPatch => "apply_patch",
            ToolKind::Exec => "exec",
            ToolKind::Process => "process",
            ToolKind::Browser => "browser",
            ToolKind::Message => "message",
            ToolKind::SessionsList => "sessions_list",
            ToolKind::SessionsHistory => "sessions_history",
            ToolKind::SessionsSend => "sessions_send",
            ToolKind::SessionsSpawn => "sessions_spawn",
            ToolKind::SessionStatus => "session_status",
            ToolKind::MemorySearch => "memory_search",
            ToolKind::MemoryGet => "memory_get",
        }
    }
}

type Predicate = fn(&PolicyContext) -> bool;

const CATALOG: &[(ToolKind, Predicate)] = &[
    (ToolKind::Read, always),
    (ToolKind::Write, always),
    (ToolKind::Edit, always),
    (ToolKind::ApplyPatch, apply_patch_enabled),
    (ToolKind::Exec, always),
    (ToolKind::Process, always),
    (ToolKind::Browser, always),
    (ToolKind::Message, always),
    (ToolKind::SessionsList, top_level_session),
    (ToolKind::SessionsHistory, top_level_session),
    (ToolKind::SessionsSend, top_level_session),
    (ToolKind::SessionsSpawn, top_level_session),
    (ToolKind::SessionStatus, always),
    (ToolKind::MemorySearch, always),
    (ToolKind::MemoryGet, always),
];

fn always(_: &PolicyContext) -> bool {
    true
}

fn top_level_session(ctx: &PolicyContext) -> bool {
    !ctx.session_scope().is_subagent
}

/// Modes where tool names must reach the provider unchanged.
fn requires_canonical_names(ctx: &PolicyContext) -> bool {
    ctx.provider_key() == "anthropic"
        && ctx
            .model_auth_mode
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case("oauth"))
}

fn apply_patch_enabled(ctx: &PolicyContext) -> bool {
    let config = &ctx.config.apply_patch;
    if !config.enabled || requires_canonical_names(ctx) {
        return false;
    }
    let provider = ctx.provider_key();
    if !APPLY_PATCH_PROVIDERS.contains(&provider.as_str()) {
        return false;
    }
    if config.allow_models.is_empty() {
        return true;
    }
    let model = ctx.model_id.trim().to_lowercase();
    let qualified = format!("{provider}/{model}");
    config.allow_models.iter().any(|m| {
        let m = m.trim().to_lowercase();
        m == model || m == qualified
    })
}

/// Shared inputs for producing tools, resolved once per build.
struct BuildEnv<'a> {
    ctx: &'a PolicyContext,
    host: &'a ToolHost,
    scope: FsScope,
}

impl BuildEnv<'_> {
    fn produce(&self, kind: ToolKind) -> Arc<dyn AgentTool> {
        let host = self.host.clone();
        let session = self.ctx.session_key.clone();
        match kind {
            ToolKind::Read => with_aliases(
                Arc::new(ReadTool::new(self.scope.clone())),
                vec![path_group()],
            ),
            ToolKind::Write => with_aliases(
                Arc::new(WriteTool::new(self.scope.clone())),
                vec![path_group()],
            ),
            ToolKind::Edit => with_aliases(Arc::new(EditTool::new(self.scope.clone())), edit_groups()),
            ToolKind::ApplyPatch => Arc::new(ApplyPatchTool::new(self.scope.clone())),
            ToolKind::Exec => Arc::new(ExecTool::new(
                self.scope.clone(),
                self.ctx.active_sandbox().cloned(),
                self.host.processes(),
            )),
            ToolKind::Process => Arc::new(ProcessTool::new(self.host.processes())),
            ToolKind::Browser => Arc::new(browser(host, self.ctx.active_sandbox().is_some())),
            ToolKind::Message => Arc::new(message(host, self.ctx.config.messaging.provider.clone())),
            ToolKind::SessionsList => Arc::new(sessions_list(host)),
            ToolKind::SessionsHistory => Arc::new(sessions_history(host)),
            ToolKind::SessionsSend => Arc::new(sessions_send(host)),
            ToolKind::SessionsSpawn => Arc::new(sessions_spawn(host, session)),
            ToolKind::SessionStatus => Arc::new(session_status(host, session)),
            ToolKind::MemorySearch => Arc::new(memory_search(host)),
            ToolKind::MemoryGet => Arc::new(memory_get(host)),
        }
    }
}

/// Build the pre-policy catalog for `ctx`.
///
/// File tools resolve against `ctx.workspace_dir`, or the current directory
/// when none is given. The current directory is only read, never changed.
pub fn build_catalog(ctx: &PolicyContext, host: &ToolHost) -> Vec<Arc<dyn AgentTool>> {
    let workspace = ctx
        .workspace_dir
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let env = BuildEnv {
        ctx,
        host,
        scope: FsScope::for_session(&workspace, ctx.active_sandbox()),
    };

    let tools: Vec<Arc<dyn AgentTool>> = CATALOG
        .iter()
        .filter(|(_, include)| include(ctx))
        .map(|(kind, _)| env.produce(*kind))
        .collect();

    debug!(
        provider = %ctx.model_provider,
        model = %ctx.model_id,
        workspace = %workspace.display(),
        tools = ?tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
        "Built tool catalog"
    );
    tools
}
