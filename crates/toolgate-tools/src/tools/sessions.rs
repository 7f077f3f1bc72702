//! Session tools: list, inspect, message, and spawn agent sessions.

use toolgate_types::{SchemaNode, ToolDefinition, optional_str, optional_u64, required_str};

use crate::context::{GatewayRequest, ToolHost};
use crate::gateway_tool::GatewayTool;

fn limit_param() -> SchemaNode {
    SchemaNode::integer("Maximum number of entries to return.")
}

pub fn sessions_list(host: ToolHost) -> GatewayTool {
    let definition = ToolDefinition {
        name: "sessions_list".to_string(),
        description: "List active sessions with their keys and last activity.".to_string(),
        parameters: SchemaNode::object([("limit", limit_param())], &[]),
    };
    GatewayTool::new(definition, host, |params| {
        Ok(GatewayRequest::ListSessions {
            limit: optional_u64(params, "limit").map(|v| v as usize),
        })
    })
}

pub fn sessions_history(host: ToolHost) -> GatewayTool {
    let definition = ToolDefinition {
        name: "sessions_history".to_string(),
        description: "Fetch the message history of a session.".to_string(),
        parameters: SchemaNode::object(
            [
                (
                    "session_key",
                    SchemaNode::string("The session key to retrieve history for."),
                ),
                ("limit", limit_param()),
            ],
            &["session_key"],
        ),
    };
    GatewayTool::new(definition, host, |params| {
        Ok(GatewayRequest::GetHistory {
            session_key: required_str(params, "session_key")?.to_string(),
            limit: optional_u64(params, "limit").map(|v| v as usize),
        })
    })
}

pub fn sessions_send(host: ToolHost) -> GatewayTool {
    let definition = ToolDefinition {
        name: "sessions_send".to_string(),
        description: "Send a message into another session.".to_string(),
        parameters: SchemaNode::object(
            [
                (
                    "session_key",
                    SchemaNode::string("The session key to send the message to."),
                ),
                ("message", SchemaNode::string("The message text to send.")),
            ],
            &["session_key", "message"],
        ),
    };
    GatewayTool::new(definition, host, |params| {
        Ok(GatewayRequest::SendMessage {
            session_key: required_str(params, "session_key")?.to_string(),
            message: required_str(params, "message")?.to_string(),
        })
    })
}

/// Spawned sessions are parented to `current_session`.
pub fn sessions_spawn(host: ToolHost, current_session: Option<String>) -> GatewayTool {
    let definition = ToolDefinition {
        name: "sessions_spawn".to_string(),
        description: "Spawn a sub-agent session to work on a task in the background.".to_string(),
        parameters: SchemaNode::object(
            [
                (
                    "task",
                    SchemaNode::string("The task description for the sub-agent."),
                ),
                (
                    "agent_id",
                    SchemaNode::string(
                        "Optional target agent ID. Uses the current agent if not specified.",
                    ),
                ),
                (
                    "label",
                    SchemaNode::string("Optional human-readable label for the session."),
                ),
            ],
            &["task"],
        ),
    };
    GatewayTool::new(definition, host, move |params| {
        Ok(GatewayRequest::SpawnSession {
            parent_session_key: current_session.clone(),
            task: required_str(params, "task")?.to_string(),
            agent_id: optional_str(params, "agent_id").map(String::from),
            label: optional_str(params, "label").map(String::from),
        })
    })
}

/// Status of `session_key`, defaulting to `current_session`.
pub fn session_status(host: ToolHost, current_session: Option<String>) -> GatewayTool {
    let definition = ToolDefinition {
        name: "session_status".to_string(),
        description: "Show status for a session: model, token usage, and activity. \
                      Defaults to the current session."
            .to_string(),
        parameters: SchemaNode::object(
            [(
                "session_key",
                SchemaNode::string("Session to inspect (default: current session)."),
            )],
            &[],
        ),
    };
    GatewayTool::new(definition, host, move |params| {
        Ok(GatewayRequest::SessionStatus {
            session_key: optional_str(params, "session_key")
                .map(String::from)
                .or_else(|| current_session.clone()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GatewayOpResult, testing::spawn_gateway};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use toolgate_types::{AgentTool, ToolError};

    #[tokio::test]
    async fn test_spawn_carries_parent_session() {
        let (host, rx) = ToolHost::channel();
        let seen = spawn_gateway(rx, |_| GatewayOpResult::Json(json!({ "sessionKey": "s2" })));

        let tool = sessions_spawn(host, Some("agent:main:telegram:1".into()));
        tool.execute(
            "s1",
            json!({ "task": "summarize the repo", "label": "summary" }),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            seen.lock().unwrap()[0],
            GatewayRequest::SpawnSession {
                parent_session_key: Some("agent:main:telegram:1".into()),
                task: "summarize the repo".into(),
                agent_id: None,
                label: Some("summary".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_status_defaults_to_current_session() {
        let (host, rx) = ToolHost::channel();
        let seen = spawn_gateway(rx, |_| GatewayOpResult::Text("ok".into()));
        let tool = session_status(host, Some("agent:main:cli".into()));

        tool.execute("s1", json!({}), CancellationToken::new())
            .await
            .unwrap();
        tool.execute("s2", json!({ "session_key": "other" }), CancellationToken::new())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0],
            GatewayRequest::SessionStatus {
                session_key: Some("agent:main:cli".into())
            }
        );
        assert_eq!(
            seen[1],
            GatewayRequest::SessionStatus {
                session_key: Some("other".into())
            }
        );
    }

    #[tokio::test]
    async fn test_send_requires_message() {
        let (host, _rx) = ToolHost::channel();
        let err = sessions_send(host)
            .execute("s1", json!({ "session_key": "k" }), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(ref p) if p == "message"));
    }

    #[test]
    fn test_definitions_are_objects() {
        let (host, _rx) = ToolHost::channel();
        for tool in [
            sessions_list(host.clone()),
            sessions_history(host.clone()),
            sessions_send(host.clone()),
            sessions_spawn(host.clone(), None),
            session_status(host, None),
        ] {
            assert!(tool.definition().parameters.is_object());
        }
    }
}
