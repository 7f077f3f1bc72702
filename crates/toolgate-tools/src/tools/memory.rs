//! Memory tools: search and read the agent's memory files.

use toolgate_types::{SchemaNode, ToolDefinition, optional_u64, required_str};

use crate::context::{GatewayRequest, ToolHost};
use crate::gateway_tool::GatewayTool;

const DEFAULT_MAX_RESULTS: usize = 10;

pub fn memory_search(host: ToolHost) -> GatewayTool {
    let definition = ToolDefinition {
        name: "memory_search".to_string(),
        description: "Search memory files for relevant notes.".to_string(),
        parameters: SchemaNode::object(
            [
                ("query", SchemaNode::string("The search query.")),
                (
                    "max_results",
                    SchemaNode::integer("Maximum number of results to return (default: 10)."),
                ),
            ],
            &["query"],
        ),
    };
    GatewayTool::new(definition, host, |params| {
        Ok(GatewayRequest::MemorySearch {
            query: required_str(params, "query")?.to_string(),
            max_results: optional_u64(params, "max_results")
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_MAX_RESULTS),
        })
    })
}

pub fn memory_get(host: ToolHost) -> GatewayTool {
    let definition = ToolDefinition {
        name: "memory_get".to_string(),
        description: "Read a memory file, optionally limited to a line range.".to_string(),
        parameters: SchemaNode::object(
            [
                ("path", SchemaNode::string("Path of the memory file to read.")),
                (
                    "start_line",
                    SchemaNode::integer("Start line (1-based, inclusive)."),
                ),
                ("end_line", SchemaNode::integer("End line (1-based, inclusive).")),
            ],
            &["path"],
        ),
    };
    GatewayTool::new(definition, host, |params| {
        Ok(GatewayRequest::MemoryGet {
            path: required_str(params, "path")?.to_string(),
            start_line: optional_u64(params, "start_line").map(|v| v as usize),
            end_line: optional_u64(params, "end_line").map(|v| v as usize),
        })
    })
}
