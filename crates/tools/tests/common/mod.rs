#![allow(dead_code)]

use quanta_tools::McpResponse;
use serde_json::Value;

/// JSON document carried in a tool response's text block.
pub fn parse_text(response: &McpResponse) -> Option<Value> {
    response
        .first_text()
        .and_then(|text| serde_json::from_str(text).ok())
}
