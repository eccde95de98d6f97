//! Google Generative Language `generateContent` client.

use crate::traits::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-8b";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), api_key, model)
    }

    pub fn with_base_url(base_url: String, api_key: String, model: String) -> Self {
        Self::with_client(Client::new(), base_url, api_key, model)
    }

    pub fn with_client(client: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// System messages become `systemInstruction`; the rest map to `user` and
/// `model` turns.
fn request_body(messages: &[Message]) -> Value {
    let system: Vec<Value> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| json!({ "text": m.content }))
        .collect();

    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::Assistant => "model",
                _ => "user",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": system });
    }
    body
}

fn parse_response(json: &Value) -> Result<GenerateResponse, ProviderError> {
    let candidate = json["candidates"].get(0).ok_or_else(|| {
        match json["promptFeedback"]["blockReason"].as_str() {
            Some(reason) => ProviderError::Api(format!("prompt blocked: {}", reason)),
            None => ProviderError::Parse("No candidates in response".to_string()),
        }
    })?;

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    Ok(GenerateResponse {
        content: (!text.is_empty()).then_some(text),
        finish_reason: candidate["finishReason"]
            .as_str()
            .unwrap_or("STOP")
            .to_string(),
    })
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn generate(&self, messages: &[Message]) -> Result<GenerateResponse, ProviderError> {
        let url = self.endpoint();
        debug!(model = %self.model, messages = messages.len(), "gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(messages))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(ProviderError::Api(format!("{}: {}", status, message)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        parse_response(&json)
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}
