//! `process` tool: background process management.
//!
//! Background `exec` runs register here; the tool lists, polls, kills, and
//! removes them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use toolgate_types::{AgentTool, AgentToolResult, SchemaNode, ToolDefinition, ToolError, required_str};

/// Registry of background processes started by `exec`.
pub struct ProcessRegistry {
    processes: RwLock<HashMap<String, ProcessEntry>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub id: String,
    pub pid: Option<u32>,
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub status: ProcessStatus,
    pub output: String,
    #[serde(skip)]
    cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Exited { code: i32 },
    Killed,
    Failed { error: String },
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            processes: RwLock::new(HashMap::new()),
        }
    }

    /// Track a freshly spawned process. Returns its id and the token that stops it.
    pub async fn register(&self, pid: Option<u32>, command: &str) -> (String, CancellationToken) {
        let id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let entry = ProcessEntry {
            id: id.clone(),
            pid,
            command: command.to_string(),
            started_at: Utc::now(),
            status: ProcessStatus::Running,
            output: String::new(),
            cancel: cancel.clone(),
        };
        self.processes.write().await.insert(id.clone(), entry);
        (id, cancel)
    }

    /// Record the final state of a process. A kill recorded earlier wins.
    pub async fn finish(&self, id: &str, status: ProcessStatus, output: String) {
        let mut procs = self.processes.write().await;
        if let Some(entry) = procs.get_mut(id) {
            if entry.status == ProcessStatus::Running {
                entry.status = status;
            }
            entry.output = output;
        }
    }

    pub async fn get(&self, id: &str) -> Option<ProcessEntry> {
        self.processes.read().await.get(id).cloned()
    }

    /// All entries, oldest first.
    pub async fn list(&self) -> Vec<ProcessEntry> {
        let mut entries: Vec<_> = self.processes.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.started_at);
        entries
    }

    /// Signal a running process to stop. Returns false for unknown ids.
    pub async fn kill(&self, id: &str) -> bool {
        let mut procs = self.processes.write().await;
        match procs.get_mut(id) {
            Some(entry) => {
                entry.cancel.cancel();
                if entry.status == ProcessStatus::Running {
                    entry.status = ProcessStatus::Killed;
                }
                true
            }
            None => false,
        }
    }

    /// Forget a process, stopping it first if it is still running.
    pub async fn remove(&self, id: &str) -> bool {
        match self.processes.write().await.remove(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProcessTool {
    registry: Arc<ProcessRegistry>,
    definition: ToolDefinition,
}

impl ProcessTool {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        let definition = ToolDefinition {
            name: "process".to_string(),
            description: "Manage background processes started by exec. Actions: list, poll, kill, remove."
                .to_string(),
            parameters: SchemaNode::object(
                [
                    (
                        "action",
                        SchemaNode::string_enum(
                            &["list", "poll", "kill", "remove"],
                            "The action to perform.",
                        ),
                    ),
                    (
                        "id",
                        SchemaNode::string("Process id returned by exec (for poll/kill/remove)."),
                    ),
                ],
                &["action"],
            ),
        };
        Self {
            registry,
            definition,
        }
    }
}

#[async_trait]
impl AgentTool for ProcessTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _request_id: &str,
        params: Value,
        _cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        let action = required_str(&params, "action")?;

        let details = match action {
            "list" => json!({ "processes": self.registry.list().await }),
            "poll" => {
                let id = required_str(&params, "id")?;
                let entry = self
                    .registry
                    .get(id)
                    .await
                    .ok_or_else(|| ToolError::invalid("id", format!("unknown process: {id}")))?;
                serde_json::to_value(entry).map_err(|e| ToolError::Execution(e.to_string()))?
            }
            "kill" => {
                let id = required_str(&params, "id")?;
                if !self.registry.kill(id).await {
                    return Err(ToolError::invalid("id", format!("unknown process: {id}")));
                }
                json!({ "id": id, "status": "killed" })
            }
            "remove" => {
                let id = required_str(&params, "id")?;
                if !self.registry.remove(id).await {
                    return Err(ToolError::invalid("id", format!("unknown process: {id}")));
                }
                json!({ "id": id, "status": "removed" })
            }
            other => {
                return Err(ToolError::invalid(
                    "action",
                    format!("unknown process action: {other}"),
                ));
            }
        };

        Ok(AgentToolResult {
            content: vec![toolgate_types::ContentBlock::text(details.to_string())],
            details: Some(details),
        })
    }
}
