//! toolgate-tools: tool catalog, policy resolution, and schema compatibility.
//!
//! Provides:
//! - The pre-policy tool catalog (filesystem, runtime, browser, messaging, sessions, memory)
//! - Tool profile and policy resolution (profile → allow/deny → agent → sub-agent → sandbox)
//! - Tool group definitions referenced as `group:<name>`
//! - Parameter alias adapters and provider schema cleaning
//! - The gateway channel that session, message, memory, and browser tools delegate to

use std::sync::Arc;

use toolgate_types::AgentTool;

pub mod alias;
pub mod catalog;
pub mod context;
pub mod gateway_tool;
pub mod groups;
pub mod policy;
pub mod profile;
pub mod sandbox;
pub mod schema;
pub mod session_key;
pub mod tools;

pub use context::{GatewayOp, GatewayOpResult, GatewayRequest, PolicyContext, ToolHost};

/// Build the catalog for `ctx` and resolve it through the tool policy.
pub fn create_tools(ctx: &PolicyContext, host: &ToolHost) -> Vec<Arc<dyn AgentTool>> {
    policy::resolve_tools(catalog::build_catalog(ctx, host), ctx)
}
