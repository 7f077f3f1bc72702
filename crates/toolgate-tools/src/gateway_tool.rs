//! Tools whose work happens in the gateway.
//!
//! A `GatewayTool` turns its call parameters into a [`GatewayRequest`] and
//! waits for the gateway's reply. Session, memory, message, and browser
//! tools are all built this way.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolgate_types::{AgentTool, AgentToolResult, ToolDefinition, ToolError};

use crate::context::{GatewayRequest, ToolHost};

type RequestBuilder = Box<dyn Fn(&Value) -> Result<GatewayRequest, ToolError> + Send + Sync>;

pub struct GatewayTool {
    definition: ToolDefinition,
    host: ToolHost,
    build: RequestBuilder,
}

impl GatewayTool {
    pub fn new<F>(definition: ToolDefinition, host: ToolHost, build: F) -> Self
    where
        F: Fn(&Value) -> Result<GatewayRequest, ToolError> + Send + Sync + 'static,
    {
        Self {
            definition,
            host,
            build: Box::new(build),
        }
    }
}

#[async_trait]
impl AgentTool for GatewayTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _request_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<AgentToolResult, ToolError> {
        let request = (self.build)(&params)?;
        tokio::select! {
            result = self.host.request(request) => result,
            _ = cancel.cancelled() => Err(ToolError::Cancelled),
        }
    }
}
