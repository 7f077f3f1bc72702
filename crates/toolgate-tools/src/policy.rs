//! Tool policy resolution: which catalog tools a session may use.
//!
//! Resolution is an ordered pipeline over the catalog's tool names:
//!
//! 1. profile selection (replace)
//! 2. group expansion (applied to every list below)
//! 3. allow/deny, then the provider-specific allow/deny (restrict)
//! 4. a configured agent's policy, when the session names one, replaces
//!    the global policy for steps 1-3
//! 5. sub-agent allow/deny (restrict)
//! 6. sandbox ceiling (restrict)
//!
//! Deny always takes priority over allow, and a non-empty allow list keeps
//! only what it names. Unknown names are ignored. Surviving tools get their
//! schemas cleaned for the provider.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use toolgate_config::{ToolPolicyFilter, ToolPolicyLayer, WorkspaceAccess};
use toolgate_types::{AgentTool, AgentToolResult, ToolDefinition, ToolError};

use crate::context::PolicyContext;
use crate::groups;
use crate::profile::ToolProfile;
use crate::schema::{SchemaTarget, clean_schema};
use crate::tools::browser::without_host_control;

/// Tools sub-agent sessions never get, on top of any configured deny.
pub const DEFAULT_SUBAGENT_DENY: &[&str] = &[
    "sessions_list",
    "sessions_history",
    "sessions_send",
    "sessions_spawn",
    "session_status",
];

/// Tools removed when the sandbox mounts the workspace read-only.
const WRITE_TOOLS: &[&str] = &["write", "edit", "apply_patch"];

/// Resolve the exposed tool set for `ctx` from the pre-policy catalog.
///
/// The result keeps catalog order, holds each name once, and every schema
/// is cleaned for the context's provider.
pub fn resolve_tools(raw: Vec<Arc<dyn AgentTool>>, ctx: &PolicyContext) -> Vec<Arc<dyn AgentTool>> {
    let mut seen = HashSet::new();
    let unique: Vec<Arc<dyn AgentTool>> = raw
        .into_iter()
        .filter(|t| seen.insert(t.name().to_string()))
        .collect();

    let names: Vec<String> = unique.iter().map(|t| t.name().to_string()).collect();
    let allowed: HashSet<String> = resolve_tool_names(&names, ctx).into_iter().collect();

    let guard_browser = ctx
        .active_sandbox()
        .is_some_and(|s| !s.browser_allow_host_control);
    let target = SchemaTarget::for_provider(&ctx.model_provider, &ctx.config.schema);

    unique
        .into_iter()
        .filter(|t| allowed.contains(t.name()))
        .map(|t| {
            if guard_browser && t.name() == "browser" {
                without_host_control(t)
            } else {
                t
            }
        })
        .map(|t| with_clean_schema(t, target))
        .collect()
}

/// Run the name pipeline over `names`, keeping their order.
pub fn resolve_tool_names(names: &[String], ctx: &PolicyContext) -> Vec<String> {
    let scope = ctx.session_scope();
    let layer = match scope
        .agent_id
        .as_deref()
        .and_then(|id| ctx.config.agents.get(id).map(|layer| (id, layer)))
    {
        Some((id, layer)) => {
            debug!(agent = id, "Using agent tool policy");
            layer
        }
        None => &ctx.config.global,
    };

    let set = apply_layer(names.to_vec(), layer, ctx);

    let set = if scope.is_subagent {
        let mut deny: Vec<String> = DEFAULT_SUBAGENT_DENY.iter().map(|s| s.to_string()).collect();
        deny.extend(ctx.config.subagents.deny.iter().cloned());
        stage("subagent", set, |set| {
            allow_deny(set, &ctx.config.subagents.allow, &deny)
        })
    } else {
        set
    };

    match ctx.active_sandbox() {
        Some(sandbox) => stage("sandbox", set, |set| {
            let mut set = allow_deny(set, &sandbox.tools.allow, &sandbox.tools.deny);
            if sandbox.workspace_access == WorkspaceAccess::Ro {
                set.retain(|name| !WRITE_TOOLS.contains(&name.as_str()));
            }
            set
        }),
        None => set,
    }
}

/// Profile, allow/deny, and provider stages of one policy layer.
fn apply_layer(set: Vec<String>, layer: &ToolPolicyLayer, ctx: &PolicyContext) -> Vec<String> {
    let set = stage("profile", set, |mut set| {
        let base = layer
            .profile
            .as_deref()
            .and_then(ToolProfile::parse)
            .and_then(|p| p.base_tools());
        if let Some(mut base) = base {
            base.extend(layer.also_allow.iter().cloned());
            let keep: HashSet<String> = groups::expand_names(&base).into_iter().collect();
            set.retain(|name| keep.contains(name));
        }
        set
    });

    let set = stage("allow/deny", set, |set| {
        let allow = if layer.allow.is_empty() {
            Vec::new()
        } else {
            layer.allow.iter().chain(&layer.also_allow).cloned().collect()
        };
        allow_deny(set, &allow, &layer.deny)
    });

    match provider_filter(layer, ctx) {
        Some(filter) => stage("provider", set, |set| {
            allow_deny(set, &filter.allow, &filter.deny)
        }),
        None => set,
    }
}

/// Provider filter for the context. `provider/model` wins over `provider`.
fn provider_filter<'a>(layer: &'a ToolPolicyLayer, ctx: &PolicyContext) -> Option<&'a ToolPolicyFilter> {
    let provider = ctx.provider_key();
    let qualified = format!("{provider}/{}", ctx.model_id.trim().to_lowercase());
    let lookup = |wanted: &str| {
        layer
            .by_provider
            .iter()
            .find(|(key, _)| key.trim().to_lowercase() == wanted)
            .map(|(_, filter)| filter)
    };
    lookup(&qualified).or_else(|| lookup(&provider))
}

/// Remove denied names, then keep only allowed names when `allow` is non-empty.
fn allow_deny(mut set: Vec<String>, allow: &[String], deny: &[String]) -> Vec<String> {
    let denied: HashSet<String> = groups::expand_names(deny).into_iter().collect();
    set.retain(|name| !denied.contains(name));
    if !allow.is_empty() {
        let allowed: HashSet<String> = groups::expand_names(allow).into_iter().collect();
        set.retain(|name| allowed.contains(name));
    }
    set
}

fn stage(label: &str, set: Vec<String>, apply: impl FnOnce(Vec<String>) -> Vec<String>) -> Vec<String> {
    let before = set.clone();
    let after = apply(set);
    if after.len() != before.len() {
        let removed: Vec<&String> = before.iter().filter(|n| !after.contains(n)).collect();
        debug!(stage = label, ?removed, "Tool policy removed tools");
    }
    after
}

// ──────────────────── Schema Cleaning ────────────────────

/// A tool presented with a provider-cleaned parameter schema.
struct CleanedTool {
    inner: Arc<dyn AgentTool>,
    definition: ToolDefinition,
}

fn with_clean_schema(tool: Arc<dyn AgentTool>, target: SchemaTarget) -> Arc<dyn AgentTool> {
    let inner_def = tool.definition();
    let definition = ToolDefinition {
        name: inner_def.name.clone(),
        description: inner_def.description.clone(),
        parameters: clean_schema(&inner_def.parameters, target),
    };
    Arc::new(CleanedTool {
        inner: tool,
        definition,
    })
}

#[async_trait]
impl AgentTool for CleanedTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        request_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        self.inner.execute(request_id, params, cancel).await
    }
}
