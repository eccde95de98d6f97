//! Locating a `TOOL_CALL:` directive inside free-form model output.

use crate::request::ToolCall;
use serde_json::{Map, Value};

pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

/// Outcome of scanning model output for a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// No marker in the text.
    Absent,
    /// A marker was found but no usable call follows it.
    Malformed(String),
    Found(ToolCall),
}

/// Find the first `TOOL_CALL:` marker and read the JSON object after it.
///
/// Only the first complete JSON value after the marker is read, so prose or a
/// closing code fence after the object is ignored. The model format names the
/// tool under `toolName`; `name` is accepted as well.
pub fn extract_tool_call(text: &str) -> Extraction {
    let Some(index) = text.find(TOOL_CALL_MARKER) else {
        return Extraction::Absent;
    };
    let rest = skip_fence(text[index + TOOL_CALL_MARKER.len()..].trim_start());

    if !rest.starts_with('{') {
        return Extraction::Malformed("expected a JSON object after TOOL_CALL:".into());
    }

    let value = match serde_json::Deserializer::from_str(rest)
        .into_iter::<Value>()
        .next()
    {
        Some(Ok(value)) => value,
        Some(Err(e)) => return Extraction::Malformed(format!("invalid tool call JSON: {}", e)),
        None => return Extraction::Malformed("empty tool call".into()),
    };

    match into_call(value) {
        Ok(call) => Extraction::Found(call),
        Err(reason) => Extraction::Malformed(reason),
    }
}

fn skip_fence(text: &str) -> &str {
    match text.strip_prefix("```") {
        Some(fenced) => {
            let fenced = fenced.trim_start_matches(|c: char| c.is_ascii_alphabetic());
            fenced.trim_start()
        }
        None => text,
    }
}

fn into_call(value: Value) -> Result<ToolCall, String> {
    let Value::Object(mut object) = value else {
        return Err("tool call must be a JSON object".into());
    };

    let name = match object.remove("toolName").or_else(|| object.remove("name")) {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(_) => return Err("tool name must be a non-empty string".into()),
        None => return Err("tool call is missing 'toolName'".into()),
    };

    let arguments = match object.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(Value::String(encoded)) => match serde_json::from_str(&encoded) {
            Ok(Value::Object(map)) => map,
            _ => return Err("'arguments' must be a JSON object".into()),
        },
        Some(_) => return Err("'arguments' must be a JSON object".into()),
    };

    Ok(ToolCall { name, arguments })
}
