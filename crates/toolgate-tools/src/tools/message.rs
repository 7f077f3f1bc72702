//! `message` tool: one tool for every chat platform.
//!
//! The platform comes from the `channel` argument or, when omitted, from
//! the configured messaging provider.

use toolgate_types::{SchemaNode, ToolDefinition, ToolError, optional_str, required_str};

use crate::context::{GatewayRequest, ToolHost};
use crate::gateway_tool::GatewayTool;

pub fn message(host: ToolHost, default_provider: Option<String>) -> GatewayTool {
    let definition = ToolDefinition {
        name: "message".to_string(),
        description: "Send a message to a user through a chat platform (Telegram, Discord, etc.)."
            .to_string(),
        parameters: SchemaNode::object(
            [
                (
                    "target",
                    SchemaNode::string("Recipient ID on the platform (chat, channel, or user)."),
                ),
                ("message", SchemaNode::string("The message text to send.")),
                (
                    "channel",
                    SchemaNode::string(
                        "Platform to send through (default: the configured messaging provider).",
                    ),
                ),
                (
                    "reply_to",
                    SchemaNode::string("Optional message ID to reply to."),
                ),
            ],
            &["target", "message"],
        ),
    };
    GatewayTool::new(definition, host, move |params| {
        let provider = optional_str(params, "channel")
            .map(str::to_lowercase)
            .or_else(|| default_provider.clone())
            .ok_or_else(|| ToolError::invalid("channel", "no messaging provider is configured"))?;
        Ok(GatewayRequest::ChannelSend {
            provider,
            target: required_str(params, "target")?.to_string(),
            text: required_str(params, "message")?.to_string(),
            reply_to: optional_str(params, "reply_to").map(String::from),
        })
    })
}
