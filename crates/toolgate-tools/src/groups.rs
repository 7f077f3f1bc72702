//! Named tool groups and tool name normalization.
//!
//! A `group:<name>` entry in an allow or deny list stands for every tool in
//! that group. Group and tool names are matched case-insensitively.

use std::collections::HashMap;

use once_cell::sync::Lazy;

struct ToolGroup {
    name: &'static str,
    members: &'static [&'static str],
}

const GROUPS: &[ToolGroup] = &[
    ToolGroup {
        name: "fs",
        members: &["read", "write", "edit"],
    },
    ToolGroup {
        name: "runtime",
        members: &["exec", "process"],
    },
    ToolGroup {
        name: "memory",
        members: &["memory_search", "memory_get"],
    },
    ToolGroup {
        name: "sessions",
        members: &[
            "sessions_list",
            "sessions_history",
            "sessions_send",
            "sessions_spawn",
            "session_status",
        ],
    },
    ToolGroup {
        name: "messaging",
        members: &["message"],
    },
    ToolGroup {
        name: "ui",
        members: &["browser"],
    },
];

/// Old or alternate spellings, mapped to the catalog name.
static LEGACY_NAMES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("bash", "exec"), ("apply-patch", "apply_patch")]));

fn group_members(group: &str) -> Option<&'static [&'static str]> {
    GROUPS.iter().find(|g| g.name == group).map(|g| g.members)
}

/// Trimmed, lowercased, and with legacy spellings replaced.
pub fn normalize_tool_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    LEGACY_NAMES
        .get(lowered.as_str())
        .map(|canonical| canonical.to_string())
        .unwrap_or(lowered)
}

/// Tool names a single list entry stands for.
///
/// Unknown groups and unknown tool names come back normalized but
/// otherwise untouched; they simply never match a catalog tool.
pub fn expand_name(entry: &str) -> Vec<String> {
    let normalized = normalize_tool_name(entry);
    normalized
        .strip_prefix("group:")
        .and_then(|group| group_members(group.trim()))
        .map(|members| members.iter().map(|m| m.to_string()).collect())
        .unwrap_or_else(|| vec![normalized])
}

/// Expand every entry, keeping first-seen order and dropping repeats.
pub fn expand_names(entries: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(entries.len());
    for name in entries.iter().flat_map(|e| expand_name(e)) {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_group_members() {
        assert_eq!(expand_name("group:fs"), vec!["read", "write", "edit"]);
    }

    #[test]
    fn test_group_lookup_ignores_case() {
        assert_eq!(expand_name("GROUP:Runtime"), vec!["exec", "process"]);
    }

    #[test]
    fn test_unknown_group_passes_through() {
        assert_eq!(expand_name("group:nonexistent"), vec!["group:nonexistent"]);
    }

    #[test]
    fn test_plain_name_is_normalized() {
        assert_eq!(expand_name(" Read "), vec!["read"]);
    }

    #[test]
    fn test_legacy_names_normalize() {
        assert_eq!(normalize_tool_name("bash"), "exec");
        assert_eq!(normalize_tool_name("Apply-Patch"), "apply_patch");
    }

    #[test]
    fn test_mixed_entries_deduplicate() {
        let entries: Vec<String> = ["group:fs", "bash", "read", "group:ui"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            expand_names(&entries),
            vec!["read", "write", "edit", "exec", "browser"]
        );
    }
}
