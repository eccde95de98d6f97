//! Untyped argument bag access with coercion.
//!
//! Models send numbers as strings and leave unused keys as `null` or `""`;
//! both count as absent, and numeric strings are coerced.

use crate::error::ToolError;
use crate::registry::ToolName;
use serde_json::{Map, Value};

pub struct Args<'a> {
    tool: ToolName,
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    /// Wrap `map`, checking the tool's required parameters are present.
    pub fn new(tool: ToolName, map: &'a Map<String, Value>) -> Result<Self, ToolError> {
        let args = Self { tool, map };
        for param in tool.params().iter().filter(|p| p.required) {
            if args.value(param.name).is_none() {
                return Err(args.invalid(param.name, "is required"));
            }
        }
        Ok(args)
    }

    fn value(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|value| !is_blank(value))
    }

    fn invalid(&self, key: &str, problem: &str) -> ToolError {
        ToolError::Validation(format!("{}: '{}' {}", self.tool, key, problem))
    }

    pub fn string(&self, key: &str) -> Result<Option<String>, ToolError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(_) => Err(self.invalid(key, "must be a string")),
        }
    }

    pub fn required_string(&self, key: &str) -> Result<String, ToolError> {
        self.string(key)?
            .ok_or_else(|| self.invalid(key, "is required"))
    }

    pub fn number(&self, key: &str) -> Result<Option<f64>, ToolError> {
        let number = match self.value(key) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match number {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(self.invalid(key, "must be a number")),
        }
    }

    pub fn integer(&self, key: &str) -> Result<Option<i64>, ToolError> {
        match self.number(key) {
            Ok(None) => Ok(None),
            Ok(Some(n)) if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 => Ok(Some(n as i64)),
            _ => Err(self.invalid(key, "must be an integer")),
        }
    }

    /// Object argument; a JSON-encoded object string is accepted too.
    pub fn object(&self, key: &str) -> Result<Option<Map<String, Value>>, ToolError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Ok(Some(map)),
                _ => Err(self.invalid(key, "must be an object")),
            },
            Some(_) => Err(self.invalid(key, "must be an object")),
        }
    }

    pub fn required_object(&self, key: &str) -> Result<Map<String, Value>, ToolError> {
        self.object(key)?
            .ok_or_else(|| self.invalid(key, "is required"))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
