//! Parameter alias support.
//!
//! Models trained on other agent harnesses call file tools with
//! `file_path`/`old_string`/`new_string`. [`with_aliases`] wraps a tool so
//! those names resolve to the canonical parameter at call time, and
//! [`add_aliases`] advertises them in the schema.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use toolgate_types::{AgentTool, AgentToolResult, SchemaKind, SchemaNode, ToolDefinition, ToolError};

/// Interchangeable argument names resolving to one canonical parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasGroup {
    pub canonical: String,
    /// Accepted keys in lookup order. Usually starts with `canonical`.
    pub keys: Vec<String>,
    /// Accept empty strings as a value (e.g. an edit's replacement text).
    pub allow_empty: bool,
}

impl AliasGroup {
    pub fn new(canonical: &str, keys: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            allow_empty: false,
        }
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    fn aliases(&self) -> impl Iterator<Item = &String> {
        self.keys.iter().filter(move |k| **k != self.canonical)
    }

    fn is_present(&self, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::String(s) => self.allow_empty || !s.trim().is_empty(),
            _ => true,
        }
    }
}

/// `path` ← `file_path`.
pub fn path_group() -> AliasGroup {
    AliasGroup::new("path", &["path", "file_path"])
}

/// Alias groups for the `edit` tool.
pub fn edit_groups() -> Vec<AliasGroup> {
    vec![
        path_group(),
        AliasGroup::new("oldText", &["oldText", "old_string"]),
        AliasGroup::new("newText", &["newText", "new_string"]).allow_empty(),
    ]
}

/// Rewrite `params` so each group is bound to its canonical key only.
///
/// Fails with [`ToolError::MissingParameter`] when a group whose canonical
/// key is in `required` has no usable value under any of its names.
pub fn resolve_aliases(
    params: Value,
    groups: &[AliasGroup],
    required: &[String],
) -> Result<Value, ToolError> {
    let mut args = match params {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for group in groups {
        let found = group
            .keys
            .iter()
            .find_map(|key| args.get(key).filter(|v| group.is_present(v)).cloned());
        for key in &group.keys {
            args.remove(key);
        }
        match found {
            Some(value) => {
                args.insert(group.canonical.clone(), value);
            }
            None if required.contains(&group.canonical) => {
                return Err(ToolError::MissingParameter(group.canonical.clone()));
            }
            None => {}
        }
    }

    Ok(Value::Object(args))
}

/// Schema companion of [`resolve_aliases`]: each canonical property gets
/// sibling copies under its alias names, and the canonical name leaves
/// `required` because any member of the group satisfies it.
pub fn add_aliases(schema: &SchemaNode, groups: &[AliasGroup]) -> SchemaNode {
    let mut patched = schema.clone();
    let SchemaKind::Object {
        properties,
        required,
    } = &mut patched.kind
    else {
        return patched;
    };

    for group in groups {
        let Some(canonical) = properties.get(&group.canonical).cloned() else {
            continue;
        };
        for alias in group.aliases() {
            if !properties.contains_key(alias) {
                properties.insert(alias.clone(), canonical.clone());
            }
        }
        required.retain(|name| *name != group.canonical);
    }
    patched
}

/// A tool whose arguments pass through alias resolution first.
pub struct AliasedTool {
    inner: Arc<dyn AgentTool>,
    groups: Vec<AliasGroup>,
    /// Required set declared by the wrapped tool, before aliasing.
    required: Vec<String>,
    definition: ToolDefinition,
}

/// Attach alias resolution to `tool`.
pub fn with_aliases(tool: Arc<dyn AgentTool>, groups: Vec<AliasGroup>) -> Arc<dyn AgentTool> {
    let inner_def = tool.definition();
    let definition = ToolDefinition {
        name: inner_def.name.clone(),
        description: inner_def.description.clone(),
        parameters: add_aliases(&inner_def.parameters, &groups),
    };
    let required = inner_def.parameters.required().to_vec();
    Arc::new(AliasedTool {
        inner: tool,
        groups,
        required,
        definition,
    })
}

#[async_trait]
impl AgentTool for AliasedTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        request_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        let params = resolve_aliases(params, &self.groups, &self.required)?;
        self.inner.execute(request_id, params, cancel).await
    }
}
