use std::path::PathBuf;

use serde_json::{Value, json};
use tracing::info;

use toolgate_config::ToolgateConfig;
use toolgate_tools::{PolicyContext, ToolHost};

pub struct CatalogRequest {
    pub provider: String,
    pub model: String,
    pub auth_mode: Option<String>,
    pub session_key: Option<String>,
    pub workspace: Option<PathBuf>,
}

/// Resolve the tool catalog and render it as pretty JSON.
pub fn run_catalog(config: &ToolgateConfig, request: CatalogRequest) -> anyhow::Result<String> {
    let mut ctx = PolicyContext::from_config(config, &request.provider, &request.model);
    ctx.model_auth_mode = request.auth_mode;
    ctx.session_key = request.session_key;
    ctx.workspace_dir = request.workspace;

    // Only definitions are printed, so nothing ever reads the gateway end.
    let (host, _ops_rx) = ToolHost::channel();
    let tools = toolgate_tools::create_tools(&ctx, &host);
    info!(
        provider = %ctx.model_provider,
        model = %ctx.model_id,
        count = tools.len(),
        "Resolved tool catalog"
    );

    let rendered: Vec<Value> = tools
        .iter()
        .map(|tool| {
            let def = tool.definition();
            json!({
                "name": def.name,
                "description": def.description,
                "parameters": def.parameters.to_value(),
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rendered)?)
}
