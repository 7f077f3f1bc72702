use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use toolgate_config::ToolgateConfig;
use toolgate_tools::schema::{SchemaTarget, clean_schema};
use toolgate_types::SchemaNode;

/// Clean the schema stored in `file` for `provider` and render it as pretty JSON.
pub fn run_clean_schema(config: &ToolgateConfig, file: &Path, provider: &str) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let raw: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    let target = SchemaTarget::for_provider(provider, &config.tools.schema);
    tracing::debug!(provider, ?target, "Cleaning schema");

    let cleaned = clean_schema(&SchemaNode::from_value(&raw), target);
    Ok(serde_json::to_string_pretty(&cleaned.to_value())?)
}
