//! Invocation context for catalog building and the gateway collaborator
//! that message, session, memory, and browser tools delegate to.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use toolgate_config::{SandboxPolicy, ToolPolicyConfig, ToolgateConfig};
use toolgate_types::{AgentToolResult, ToolError};

use crate::session_key::{SessionScope, parse_session_key};
use crate::tools::process::ProcessRegistry;

/// Everything that decides which tools a session sees. Read-only to this crate.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    /// Provider id, e.g. "openai", "anthropic", "google".
    pub model_provider: String,
    pub model_id: String,
    /// Auth mode, e.g. "api-key" or "oauth".
    pub model_auth_mode: Option<String>,
    pub session_key: Option<String>,
    /// Workspace for file tools. Falls back to the current directory at build time.
    pub workspace_dir: Option<PathBuf>,
    pub sandbox: Option<SandboxPolicy>,
    pub config: ToolPolicyConfig,
}

impl PolicyContext {
    /// Context carrying the policy and sandbox sections of `config`.
    pub fn from_config(config: &ToolgateConfig, model_provider: &str, model_id: &str) -> Self {
        Self {
            model_provider: model_provider.to_string(),
            model_id: model_id.to_string(),
            sandbox: config.sandbox.clone(),
            config: config.tool_policy(),
            ..Default::default()
        }
    }

    pub fn session_scope(&self) -> SessionScope {
        self.session_key
            .as_deref()
            .map(parse_session_key)
            .unwrap_or_default()
    }

    /// The sandbox policy, when sandboxing is actually on.
    pub fn active_sandbox(&self) -> Option<&SandboxPolicy> {
        self.sandbox.as_ref().filter(|s| s.enabled)
    }

    pub fn provider_key(&self) -> String {
        self.model_provider.trim().to_lowercase()
    }
}

// ──────────────────── Gateway Collaborator ────────────────────

/// Which browser a browser action drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserTarget {
    Sandbox,
    Host,
}

/// Operations tools ask the gateway to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayRequest {
    ListSessions {
        limit: Option<usize>,
    },
    GetHistory {
        session_key: String,
        limit: Option<usize>,
    },
    SendMessage {
        session_key: String,
        message: String,
    },
    SpawnSession {
        parent_session_key: Option<String>,
        task: String,
        agent_id: Option<String>,
        label: Option<String>,
    },
    SessionStatus {
        session_key: Option<String>,
    },
    /// Deliver a message through an external chat platform.
    ChannelSend {
        provider: String,
        target: String,
        text: String,
        reply_to: Option<String>,
    },
    MemorySearch {
        query: String,
        max_results: usize,
    },
    MemoryGet {
        path: String,
        start_line: Option<usize>,
        end_line: Option<usize>,
    },
    Browser {
        target: BrowserTarget,
        action: String,
        params: Value,
    },
}

/// A request plus the channel its answer goes back on.
#[derive(Debug)]
pub struct GatewayOp {
    pub request: GatewayRequest,
    pub reply: oneshot::Sender<GatewayOpResult>,
}

/// Results from gateway operations.
#[derive(Debug)]
pub enum GatewayOpResult {
    Json(Value),
    Text(String),
    Error(String),
}

/// Shared handles tools are constructed with.
#[derive(Clone)]
pub struct ToolHost {
    ops_tx: mpsc::UnboundedSender<GatewayOp>,
    processes: Arc<ProcessRegistry>,
}

impl ToolHost {
    pub fn new(ops_tx: mpsc::UnboundedSender<GatewayOp>) -> Self {
        Self {
            ops_tx,
            processes: Arc::new(ProcessRegistry::new()),
        }
    }

    /// Host plus the receiving end of its gateway channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GatewayOp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn processes(&self) -> Arc<ProcessRegistry> {
        self.processes.clone()
    }

    /// Send `request` to the gateway and turn its reply into a tool result.
    pub async fn request(&self, request: GatewayRequest) -> Result<AgentToolResult, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.ops_tx
            .send(GatewayOp { request, reply: tx })
            .map_err(|_| ToolError::Gateway("gateway is not running".into()))?;

        let result = rx
            .await
            .map_err(|_| ToolError::Gateway("gateway dropped the request".into()))?;
        match result {
            GatewayOpResult::Json(v) => {
                let text = serde_json::to_string_pretty(&v)
                    .map_err(|e| ToolError::Gateway(e.to_string()))?;
                Ok(AgentToolResult {
                    content: vec![toolgate_types::ContentBlock::text(text)],
                    details: Some(v),
                })
            }
            GatewayOpResult::Text(t) => Ok(AgentToolResult::text(t)),
            GatewayOpResult::Error(e) => Err(ToolError::Gateway(e)),
        }
    }
}
