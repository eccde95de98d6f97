use crate::chat::ChatService;
use crate::config::{Config, LLMProvider};
use anyhow::{Context, Result};
use quanta_providers::{GeminiProvider, OpenAICompatibleProvider};
use quanta_store::PocketBaseStore;
use quanta_tools::DispatcherOptions;
use std::sync::Arc;
use std::time::Duration;

/// Build the chat service described by a validated `config`.
pub fn build_chat_service(config: &Config) -> Result<ChatService> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let store = PocketBaseStore::new(&config.pocketbase_url, timeout)
        .context("Failed to create PocketBase client")?;

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let provider: Arc<dyn quanta_providers::LLMProvider> = match &config.provider {
        LLMProvider::Gemini => Arc::new(GeminiProvider::with_client(
            client,
            LLMProvider::Gemini.base_url().to_string(),
            config.api_key.clone().unwrap_or_default(),
            config.model.clone(),
        )),
        LLMProvider::OpenaiCompatible { base_url } => Arc::new(OpenAICompatibleProvider::with_client(
            client,
            base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
        )),
    };

    Ok(ChatService::new(provider, Arc::new(store)).with_options(dispatcher_options(config)))
}

pub fn dispatcher_options(config: &Config) -> DispatcherOptions {
    DispatcherOptions {
        transactions_collection: config.transactions_collection.clone(),
        users_collection: config.users_collection.clone(),
        allowed_collections: config.allowed_collections.clone(),
    }
}
