//! Chat turn: ask the model, run at most one tool call for it, and ask again
//! with the tool's data.

use quanta_providers::{LLMProvider, Message, ProviderError};
use quanta_store::RecordStore;
use quanta_tools::{
    extract_tool_call, DispatcherOptions, Extraction, ToolDescriptor, ToolDispatcher,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ASSISTANT_NAME: &str = "Quanta";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Prompt is required")]
    MissingPrompt,

    #[error("User ID is required")]
    MissingUser,

    #[error("Invalid user ID: {0}")]
    InvalidUser(String),

    #[error("Model request failed: {0}")]
    Provider(#[from] ProviderError),
}

impl ChatError {
    /// Whether the caller can fix the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ChatError::Provider(_))
    }
}

pub struct ChatService {
    provider: Arc<dyn LLMProvider>,
    store: Arc<dyn RecordStore>,
    options: DispatcherOptions,
}

impl ChatService {
    pub fn new(provider: Arc<dyn LLMProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            provider,
            store,
            options: DispatcherOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatcherOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn answer(&self, request: ChatRequest) -> Result<String, ChatError> {
        let prompt = non_blank(request.prompt).ok_or(ChatError::MissingPrompt)?;
        let user_id = non_blank(request.user_id).ok_or(ChatError::MissingUser)?;

        let mut dispatcher =
            ToolDispatcher::new(self.store.clone()).with_options(self.options.clone());
        dispatcher
            .set_current_user(&user_id, request.auth_token.as_deref())
            .map_err(|e| ChatError::InvalidUser(e.kind().to_string()))?;

        info!(user_id = %user_id, provider = self.provider.name(), "chat request");

        let messages = [
            Message::system(system_prompt(&dispatcher.list_tools())),
            Message::user(format!("User question: {}", prompt)),
        ];
        let first = self.provider.generate(&messages).await?;
        let text = first.text().to_string();

        let call = match extract_tool_call(&text) {
            Extraction::Absent => return Ok(text),
            Extraction::Malformed(reason) => {
                warn!(%reason, "model emitted an unusable tool call");
                return Ok(with_error_note(text, &reason));
            }
            Extraction::Found(call) => call,
        };

        debug!(tool = %call.name, "model requested tool");
        let data = match dispatcher.execute_tool(&call).await {
            Ok(response) => response.first_text().unwrap_or("{}").to_string(),
            Err(e) => return Ok(with_error_note(text, &e.to_string())),
        };

        let follow_up = [Message::user(follow_up_prompt(&prompt, &data))];
        match self.provider.generate(&follow_up).await {
            Ok(response) => Ok(response.text().to_string()),
            Err(e) => {
                warn!(error = %e, "follow-up generation failed");
                Ok(with_error_note(text, &e.to_string()))
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn system_prompt(tools: &[ToolDescriptor]) -> String {
    let catalog: Vec<_> = tools
        .iter()
        .map(|tool| serde_json::json!({ "name": tool.name, "description": tool.description }))
        .collect();
    let catalog = quanta_tools::safe_stringify(&catalog);

    format!(
        "You are a concise and on point, helpful AI assistant called {ASSISTANT_NAME} for \
         analyzing financial transactions with access to powerful database tools.\n\n\
         Available tools for data analysis:\n{catalog}\n\n\
         Instructions:\n\
         1. Always ensure data security - you can only access data belonging to the authenticated user.\n\
         2. Keep your responses concise and to the point in a few words.\n\n\
         Respond with analysis. If you need to call a tool, format it EXACTLY as:\n\
         TOOL_CALL: {{\"toolName\": \"tool_name\", \"arguments\": {{\"key1\": \"value1\", \"key2\": \"value2\"}}}}\n\
         Ensure the JSON for TOOL_CALL is valid, with all keys and string values enclosed in double quotes."
    )
}

pub fn follow_up_prompt(prompt: &str, data: &str) -> String {
    format!(
        "Based on the user's question: \"{prompt}\"\n\n\
         Here's the data I retrieved:\n{data}\n\n\
         Please provide a concise answer to the user's question based on this data. \
         Make it human-readable and actionable."
    )
}

pub fn with_error_note(mut text: String, message: &str) -> String {
    text.push_str("\n\nNote: I encountered an error while trying to fetch your data: ");
    text.push_str(message);
    text
}
