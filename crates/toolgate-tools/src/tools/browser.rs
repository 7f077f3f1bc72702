//! `browser` tool: drive a browser through the gateway.
//!
//! Sandboxed sessions default to the sandbox's own browser and may opt into
//! the host browser with `target: "host"`. [`without_host_control`] removes
//! that option.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolgate_types::{
    AgentTool, AgentToolResult, SchemaKind, SchemaNode, ToolDefinition, ToolError, optional_str,
    required_str,
};

use crate::context::{BrowserTarget, GatewayRequest, ToolHost};
use crate::gateway_tool::GatewayTool;

const ACTIONS: &[&str] = &[
    "status",
    "start",
    "stop",
    "tabs",
    "open",
    "navigate",
    "snapshot",
    "screenshot",
    "act",
    "close",
];

pub fn browser(host: ToolHost, sandboxed: bool) -> GatewayTool {
    let targets: &[&str] = if sandboxed {
        &["sandbox", "host"]
    } else {
        &["host"]
    };
    let definition = ToolDefinition {
        name: "browser".to_string(),
        description: "Control a web browser: open pages, take snapshots and screenshots, \
                      and act on page elements."
            .to_string(),
        parameters: SchemaNode::object(
            [
                (
                    "action",
                    SchemaNode::string_enum(ACTIONS, "The browser action to perform."),
                ),
                (
                    "target",
                    SchemaNode::string_enum(targets, "Which browser to drive."),
                ),
                ("url", SchemaNode::string("URL for open/navigate.")),
                (
                    "ref",
                    SchemaNode::string("Element reference from a snapshot (for act)."),
                ),
                ("text", SchemaNode::string("Text to type (for act).")),
            ],
            &["action"],
        ),
    };
    GatewayTool::new(definition, host, move |params| {
        let action = required_str(params, "action")?;
        if !ACTIONS.contains(&action) {
            return Err(ToolError::invalid(
                "action",
                format!("unknown browser action: {action}"),
            ));
        }
        let target = match optional_str(params, "target") {
            Some("host") => BrowserTarget::Host,
            Some("sandbox") if sandboxed => BrowserTarget::Sandbox,
            Some(other) => {
                return Err(ToolError::invalid(
                    "target",
                    format!("unavailable browser target: {other}"),
                ));
            }
            None if sandboxed => BrowserTarget::Sandbox,
            None => BrowserTarget::Host,
        };
        let mut rest = params.clone();
        if let Some(map) = rest.as_object_mut() {
            map.remove("action");
            map.remove("target");
        }
        Ok(GatewayRequest::Browser {
            target,
            action: action.to_string(),
            params: rest,
        })
    })
}

/// Browser without the host target, for sandboxes that forbid host control.
struct HostControlGuard {
    inner: Arc<dyn AgentTool>,
    definition: ToolDefinition,
}

pub fn without_host_control(inner: Arc<dyn AgentTool>) -> Arc<dyn AgentTool> {
    let mut definition = inner.definition().clone();
    if let SchemaKind::Object { properties, .. } = &mut definition.parameters.kind {
        if let Some(values) = properties
            .get_mut("target")
            .and_then(|t| t.enum_values.as_mut())
        {
            values.retain(|v| v.as_str() != Some("host"));
        }
    }
    Arc::new(HostControlGuard { inner, definition })
}

#[async_trait]
impl AgentTool for HostControlGuard {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        request_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        if optional_str(&params, "target") == Some("host") {
            return Err(ToolError::SandboxViolation(
                "host browser control is disabled in this sandbox".into(),
            ));
        }
        self.inner.execute(request_id, params, cancel).await
    }
}
