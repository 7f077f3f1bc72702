use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

// ──────────────────── Tool Policy ────────────────────

/// Plain allow/deny pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPolicyFilter {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

/// One layer of tool policy: the global `tools` section or an agent's override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPolicyLayer {
    /// Named profile (`minimal`, `coding`, `messaging`, `full`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Allow-only list. When non-empty, nothing outside it survives.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Extra tools merged into the profile set and a non-empty allow list.
    #[serde(default)]
    pub also_allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    /// Restrictions keyed by `provider` or `provider/model`.
    #[serde(default)]
    pub by_provider: HashMap<String, ToolPolicyFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPatchConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Model ids (`gpt-5` or `openai/gpt-5`) allowed to see `apply_patch`. Empty means any.
    #[serde(default)]
    pub allow_models: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecToolsConfig {
    #[serde(default)]
    pub apply_patch: ApplyPatchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubagentsConfig {
    #[serde(default)]
    pub tools: ToolPolicyFilter,
}

/// Provider → schema compatibility class mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaConfig {
    /// Providers that reject unions, `$ref`, and validation-only keywords.
    #[serde(default = "default_strict_providers")]
    pub strict_providers: Vec<String>,
}

fn default_strict_providers() -> Vec<String> {
    ["google", "google-gemini-cli", "google-antigravity", "google-vertex"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            strict_providers: default_strict_providers(),
        }
    }
}

/// The `tools` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(flatten)]
    pub policy: ToolPolicyLayer,
    #[serde(default)]
    pub exec: ExecToolsConfig,
    #[serde(default)]
    pub subagents: SubagentsConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

// ──────────────────── Agents ────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub id: String,
    /// Agent-specific tool policy; replaces the global one entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolPolicyLayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub list: Vec<AgentEntry>,
}

// ──────────────────── Sandbox ────────────────────

/// How much of the agent workspace the sandbox sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceAccess {
    /// Sandbox works in its own private directory.
    #[default]
    None,
    Ro,
    Rw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    #[serde(default = "default_docker_image")]
    pub image: String,
    /// Working directory inside the container.
    #[serde(default = "default_docker_workdir")]
    pub workdir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_docker_image() -> String {
    "debian:bookworm-slim".to_string()
}

fn default_docker_workdir() -> String {
    "/workspace".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            image: default_docker_image(),
            workdir: default_docker_workdir(),
            network: None,
            env: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub workspace_access: WorkspaceAccess,
    /// Private sandbox directory used when `workspace_access` is `none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    /// Tool ceiling applied while sandboxed.
    #[serde(default)]
    pub tools: ToolPolicyFilter,
    #[serde(default)]
    pub browser_allow_host_control: bool,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default)]
    pub docker: DockerConfig,
}

fn default_container_name() -> String {
    "toolgate-sandbox".to_string()
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            workspace_access: WorkspaceAccess::default(),
            workspace_root: None,
            tools: ToolPolicyFilter::default(),
            browser_allow_host_control: false,
            container_name: default_container_name(),
            docker: DockerConfig::default(),
        }
    }
}

// ──────────────────── Messaging ────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Chat platform the unified `message` tool delivers through (e.g. "telegram").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

// ──────────────────── Top Level ────────────────────

/// Top-level toolgate configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolgateConfig {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxPolicy>,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

/// Policy inputs consumed by catalog building and policy resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolPolicyConfig {
    pub global: ToolPolicyLayer,
    /// Agent overrides keyed by lowercase agent id. Only agents that declare
    /// their own `tools` section appear here.
    pub agents: HashMap<String, ToolPolicyLayer>,
    pub subagents: ToolPolicyFilter,
    pub apply_patch: ApplyPatchConfig,
    pub schema: SchemaConfig,
    pub messaging: MessagingConfig,
}

impl ToolgateConfig {
    /// Collect the tool policy view of this configuration.
    pub fn tool_policy(&self) -> ToolPolicyConfig {
        let agents = self
            .agents
            .list
            .iter()
            .filter_map(|agent| {
                agent
                    .tools
                    .clone()
                    .map(|tools| (agent.id.trim().to_lowercase(), tools))
            })
            .collect();
        ToolPolicyConfig {
            global: self.tools.policy.clone(),
            agents,
            subagents: self.tools.subagents.tools.clone(),
            apply_patch: self.tools.exec.apply_patch.clone(),
            schema: self.tools.schema.clone(),
            messaging: self.messaging.clone(),
        }
    }
}

/// Resolve the toolgate config directory (~/.toolgate/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".toolgate"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.toolgate/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<ToolgateConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<ToolgateConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(ToolgateConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: ToolgateConfig = json5::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ToolgateConfig::default();
        assert!(config.tools.policy.profile.is_none());
        assert!(config.sandbox.is_none());
        assert!(!config.tools.exec.apply_patch.enabled);
        assert!(
            config
                .tools
                .schema
                .strict_providers
                .contains(&"google".to_string())
        );
    }

    #[test]
    fn test_json5_parse_tools_section() {
        let json5_str = r#"{
            tools: {
                profile: "coding",
                deny: ["exec"],
                alsoAllow: ["message"],
                byProvider: { "google": { deny: ["browser"] } },
                exec: { applyPatch: { enabled: true, allowModels: ["gpt-5"] } },
                subagents: { tools: { deny: ["message"] } },
            },
        }"#;
        let config: ToolgateConfig = json5::from_str(json5_str).unwrap();
        let tools = &config.tools;
        assert_eq!(tools.policy.profile.as_deref(), Some("coding"));
        assert_eq!(tools.policy.deny, vec!["exec"]);
        assert_eq!(tools.policy.also_allow, vec!["message"]);
        assert_eq!(tools.policy.by_provider["google"].deny, vec!["browser"]);
        assert!(tools.exec.apply_patch.enabled);
        assert_eq!(tools.exec.apply_patch.allow_models, vec!["gpt-5"]);
        assert_eq!(tools.subagents.tools.deny, vec!["message"]);
    }

    #[test]
    fn test_json5_parse_sandbox_and_agents() {
        let json5_str = r#"{
            agents: {
                list: [
                    { id: "Coder", tools: { allow: ["group:fs"] } },
                    { id: "plain" },
                ],
            },
            sandbox: {
                enabled: true,
                workspaceAccess: "ro",
                browserAllowHostControl: false,
                tools: { allow: ["read", "exec"] },
                docker: { image: "alpine:3" },
            },
            messaging: { provider: "telegram" },
        }"#;
        let config: ToolgateConfig = json5::from_str(json5_str).unwrap();
        let sandbox = config.sandbox.as_ref().unwrap();
        assert!(sandbox.enabled);
        assert_eq!(sandbox.workspace_access, WorkspaceAccess::Ro);
        assert_eq!(sandbox.docker.image, "alpine:3");
        assert_eq!(sandbox.docker.workdir, "/workspace");
        assert_eq!(sandbox.container_name, "toolgate-sandbox");

        let policy = config.tool_policy();
        assert_eq!(policy.agents.len(), 1);
        assert_eq!(policy.agents["coder"].allow, vec!["group:fs"]);
        assert_eq!(policy.messaging.provider.as_deref(), Some("telegram"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.json5")).unwrap();
        assert_eq!(config, ToolgateConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, "{ tools: { allow: ['read'] } }").unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.tools.policy.allow, vec!["read"]);
    }
}
