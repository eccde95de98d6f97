use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

/// Tool result envelope: one text block holding a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl McpResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Wrap `data` through [`safe_stringify`].
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Self {
        Self::text(safe_stringify(data))
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|block| match block {
            ContentBlock::Text { text } => text.as_str(),
        })
    }
}

/// Pretty JSON for `data`. Never fails: when `data` cannot be serialized the
/// result is a fixed-shape diagnostic object instead.
pub fn safe_stringify<T: Serialize + ?Sized>(data: &T) -> String {
    match serde_json::to_string_pretty(data) {
        Ok(text) => text,
        Err(e) => {
            let data_type = std::any::type_name::<T>();
            error!(error = %e, data_type, "failed to serialize tool result");
            let fallback = json!({
                "error": "Failed to serialize data",
                "message": e.to_string(),
                "dataType": data_type,
            });
            format!("{:#}", fallback)
        }
    }
}
