//! Session key parsing.
//!
//! Keys look like `agent:<agentId>:<channel>:<peer>`; sessions spawned by
//! another session carry a `subagent` segment, e.g.
//! `agent:main:subagent:5f2c...`.

/// What a session key says about the invoking session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionScope {
    /// Lowercase agent id, when the key names one.
    pub agent_id: Option<String>,
    pub is_subagent: bool,
}

pub fn parse_session_key(key: &str) -> SessionScope {
    let key = key.trim().to_lowercase();
    let segments: Vec<&str> = key.split(':').map(str::trim).collect();

    let agent_id = match segments.as_slice() {
        ["agent", id, ..] if !id.is_empty() => Some(id.to_string()),
        _ => None,
    };
    let is_subagent = segments.iter().any(|s| *s == "subagent");

    SessionScope {
        agent_id,
        is_subagent,
    }
}
