//! Pre-defined tool profiles.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolProfile {
    /// Only `session_status`, for read-only agents.
    Minimal,
    /// File system, runtime, sessions, memory, and patch tools.
    Coding,
    /// Messaging plus session inspection and sending.
    Messaging,
    /// No restriction.
    Full,
}

impl ToolProfile {
    /// Parse a configured profile name. Unknown names yield `None` with a warning.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "minimal" => Some(Self::Minimal),
            "coding" => Some(Self::Coding),
            "messaging" => Some(Self::Messaging),
            "full" => Some(Self::Full),
            other => {
                warn!(profile = other, "Unknown tool profile, ignoring");
                None
            }
        }
    }

    /// Base tool set as tool/group names. `None` means every tool.
    pub fn base_tools(&self) -> Option<Vec<String>> {
        let names: &[&str] = match self {
            ToolProfile::Minimal => &["session_status"],
            ToolProfile::Coding => &[
                "group:fs",
                "group:runtime",
                "group:sessions",
                "group:memory",
                "apply_patch",
            ],
            ToolProfile::Messaging => &[
                "group:messaging",
                "sessions_list",
                "sessions_history",
                "sessions_send",
                "session_status",
            ],
            ToolProfile::Full => return None,
        };
        Some(names.iter().map(|s| s.to_string()).collect())
    }
}
