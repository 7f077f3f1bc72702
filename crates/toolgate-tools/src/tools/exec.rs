//! `exec` tool: shell command execution with timeout, output truncation,
//! and background mode.
//!
//! Sandboxed sessions run commands inside the sandbox container via
//! `docker exec`; everything else runs `sh -c` in the workspace.

use std::path::{Component, Path};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolgate_config::SandboxPolicy;
use toolgate_types::{
    AgentTool, AgentToolResult, ContentBlock, SchemaNode, ToolDefinition, ToolError,
    optional_str, optional_u64, required_str,
};

use crate::sandbox::FsScope;
use crate::tools::process::{ProcessRegistry, ProcessStatus};

/// Maximum output size in characters before truncation.
const MAX_OUTPUT_CHARS: usize = 200_000;

/// Default timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct ExecTool {
    scope: FsScope,
    sandbox: Option<SandboxPolicy>,
    processes: Arc<ProcessRegistry>,
    definition: ToolDefinition,
}

impl ExecTool {
    pub fn new(
        scope: FsScope,
        sandbox: Option<SandboxPolicy>,
        processes: Arc<ProcessRegistry>,
    ) -> Self {
        let definition = ToolDefinition {
            name: "exec".to_string(),
            description: "Execute a shell command with a configurable timeout, output truncation, \
                          and background mode. Background runs are managed with the process tool."
                .to_string(),
            parameters: SchemaNode::object(
                [
                    ("command", SchemaNode::string("The shell command to execute.")),
                    (
                        "timeout_seconds",
                        SchemaNode::integer("Timeout in seconds (default: 120)."),
                    ),
                    (
                        "background",
                        SchemaNode::boolean("Run in background mode (default: false)."),
                    ),
                    (
                        "workdir",
                        SchemaNode::string("Working directory, relative to the workspace."),
                    ),
                ],
                &["command"],
            ),
        };
        Self {
            scope,
            sandbox: sandbox.filter(|s| s.enabled),
            processes,
            definition,
        }
    }

    fn build_command(&self, command: &str, workdir: Option<&str>) -> Result<Command, ToolError> {
        let mut cmd = match &self.sandbox {
            Some(sandbox) => {
                let dir = container_workdir(&sandbox.docker.workdir, workdir)?;
                let mut cmd = Command::new("docker");
                cmd.arg("exec").arg("-w").arg(dir);
                let mut env: Vec<_> = sandbox.docker.env.iter().collect();
                env.sort();
                for (key, value) in env {
                    cmd.arg("-e").arg(format!("{key}={value}"));
                }
                cmd.arg(&sandbox.container_name)
                    .arg("sh")
                    .arg("-lc")
                    .arg(command);
                cmd
            }
            None => {
                let dir = match workdir {
                    Some(dir) => self.scope.resolve(dir)?,
                    None => self.scope.root().to_path_buf(),
                };
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(command).current_dir(dir);
                cmd
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    async fn run_background(
        &self,
        mut cmd: Command,
        command: &str,
    ) -> Result<AgentToolResult, ToolError> {
        let child = cmd
            .spawn()
            .map_err(|e| ToolError::Execution(format!("Failed to spawn command: {e}")))?;
        let pid = child.id();
        let (id, cancel) = self.processes.register(pid, command).await;
        debug!(id = %id, ?pid, "Background process started");

        let registry = self.processes.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = child.wait_with_output() => match res {
                    Ok(output) => {
                        let (text, _) = format_output(&output);
                        let code = output.status.code().unwrap_or(-1);
                        registry.finish(&task_id, ProcessStatus::Exited { code }, text).await;
                    }
                    Err(e) => {
                        warn!(id = %task_id, error = %e, "Background process failed");
                        registry
                            .finish(&task_id, ProcessStatus::Failed { error: e.to_string() }, String::new())
                            .await;
                    }
                },
                _ = cancel.cancelled() => {
                    debug!(id = %task_id, "Background process killed");
                }
            }
        });

        let details = json!({
            "mode": "background",
            "id": id,
            "pid": pid,
            "command": command,
            "status": "started"
        });
        Ok(AgentToolResult {
            content: vec![ContentBlock::text(details.to_string())],
            details: Some(details),
        })
    }
}

#[async_trait]
impl AgentTool for ExecTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _request_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        let command = required_str(&params, "command")?;
        let timeout_secs = optional_u64(&params, "timeout_seconds").unwrap_or(DEFAULT_TIMEOUT_SECS);
        let background = params
            .get("background")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let mut cmd = self.build_command(command, optional_str(&params, "workdir"))?;
        info!(
            command,
            background,
            sandboxed = self.sandbox.is_some(),
            "Executing command"
        );

        if background {
            return self.run_background(cmd, command).await;
        }

        let child = cmd
            .spawn()
            .map_err(|e| ToolError::Execution(format!("Failed to spawn command: {e}")))?;
        let timeout = tokio::time::Duration::from_secs(timeout_secs);
        let output = tokio::select! {
            res = tokio::time::timeout(timeout, child.wait_with_output()) => match res {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return Err(ToolError::Execution(format!("Command execution failed: {e}"))),
                Err(_) => return Err(ToolError::Timeout(timeout_secs)),
            },
            _ = cancel.cancelled() => return Err(ToolError::Cancelled),
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let (text, truncated) = format_output(&output);
        Ok(AgentToolResult {
            content: vec![ContentBlock::text(text)],
            details: Some(json!({ "exitCode": exit_code, "truncated": truncated })),
        })
    }
}

/// Working directory inside the container. Relative paths may not climb out.
fn container_workdir(base: &str, requested: Option<&str>) -> Result<String, ToolError> {
    let Some(requested) = requested.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(base.to_string());
    };
    let path = Path::new(requested);
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ToolError::SandboxViolation(requested.to_string()));
    }
    if path.is_absolute() {
        if !path.starts_with(base) {
            return Err(ToolError::SandboxViolation(requested.to_string()));
        }
        return Ok(requested.to_string());
    }
    Ok(Path::new(base).join(path).to_string_lossy().into_owned())
}

fn format_output(output: &std::process::Output) -> (String, bool) {
    let exit_code = output.status.code().unwrap_or(-1);
    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let mut truncated = false;
    for stream in [&mut stdout, &mut stderr] {
        if truncate_chars(stream, MAX_OUTPUT_CHARS) {
            stream.push_str("\n... [output truncated]");
            truncated = true;
        }
    }

    let mut result = format!("Exit code: {exit_code}\n");
    if !stdout.is_empty() {
        result.push_str(&format!("\n--- stdout ---\n{stdout}\n"));
    }
    if !stderr.is_empty() {
        result.push_str(&format!("\n--- stderr ---\n{stderr}\n"));
    }
    if truncated {
        result.push_str("\n[Output was truncated due to size limits]\n");
    }
    (result, truncated)
}

/// Truncate to at most `max` chars on a char boundary.
fn truncate_chars(s: &mut String, max: usize) -> bool {
    match s.char_indices().nth(max) {
        Some((idx, _)) => {
            s.truncate(idx);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_config::{DockerConfig, WorkspaceAccess};

    fn host_tool(dir: &Path) -> ExecTool {
        ExecTool::new(
            FsScope::open(dir.to_path_buf()),
            None,
            Arc::new(ProcessRegistry::new()),
        )
    }

    fn sandboxed_tool() -> ExecTool {
        let policy = SandboxPolicy {
            enabled: true,
            workspace_access: WorkspaceAccess::Rw,
            docker: DockerConfig {
                env: [("LANG".to_string(), "C.UTF-8".to_string())].into(),
                ..Default::default()
            },
            ..Default::default()
        };
        ExecTool::new(
            FsScope::for_session(Path::new("/work"), Some(&policy)),
            Some(policy),
            Arc::new(ProcessRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_exec_runs_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let result = host_tool(dir.path())
            .execute("x1", json!({ "command": "ls" }), CancellationToken::new())
            .await
            .unwrap();
        let text = result.joined_text();
        assert!(text.starts_with("Exit code: 0"));
        assert!(text.contains("marker.txt"));
        assert_eq!(result.details.unwrap()["exitCode"], json!(0));
    }

    #[tokio::test]
    async fn test_exec_reports_stderr_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = host_tool(dir.path())
            .execute(
                "x1",
                json!({ "command": "echo oops >&2; exit 3" }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let text = result.joined_text();
        assert!(text.starts_with("Exit code: 3"));
        assert!(text.contains("--- stderr ---\noops"));
    }

    #[tokio::test]
    async fn test_exec_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let err = host_tool(dir.path())
            .execute(
                "x1",
                json!({ "command": "sleep 5", "timeout_seconds": 1 }),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_exec_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = host_tool(dir.path())
            .execute("x1", json!({ "command": "sleep 5" }), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
    }

    #[tokio::test]
    async fn test_background_run_registers_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let tool = host_tool(dir.path());
        let result = tool
            .execute(
                "x1",
                json!({ "command": "echo bg", "background": true }),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let id = result.details.unwrap()["id"].as_str().unwrap().to_string();

        let mut status = ProcessStatus::Running;
        for _ in 0..100 {
            status = tool.processes.get(&id).await.unwrap().status;
            if status != ProcessStatus::Running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(status, ProcessStatus::Exited { code: 0 });
        assert!(tool.processes.get(&id).await.unwrap().output.contains("bg"));
    }

    #[test]
    fn test_sandboxed_command_uses_docker_exec() {
        let cmd = sandboxed_tool().build_command("ls -la", Some("src")).unwrap();
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "docker");
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "exec",
                "-w",
                "/workspace/src",
                "-e",
                "LANG=C.UTF-8",
                "toolgate-sandbox",
                "sh",
                "-lc",
                "ls -la"
            ]
        );
    }

    #[test]
    fn test_container_workdir_rejects_escape() {
        assert!(matches!(
            container_workdir("/workspace", Some("../etc")),
            Err(ToolError::SandboxViolation(_))
        ));
        assert!(matches!(
            container_workdir("/workspace", Some("/etc")),
            Err(ToolError::SandboxViolation(_))
        ));
        assert_eq!(
            container_workdir("/workspace", Some("/workspace/a")).unwrap(),
            "/workspace/a"
        );
        assert_eq!(container_workdir("/workspace", None).unwrap(), "/workspace");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let mut s = "ééé".to_string();
        assert!(truncate_chars(&mut s, 2));
        assert_eq!(s, "éé");
        let mut short = "ab".to_string();
        assert!(!truncate_chars(&mut short, 2));
    }
}
