#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use quanta_providers::{GenerateResponse, LLMProvider, Message, ProviderError};
use quanta_store::{MemoryStore, Record};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;

/// Provider that replays canned replies and records every prompt it sees.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = &'static str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn with_failure(self: Arc<Self>, message: &str) -> Arc<Self> {
        self.replies.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, messages: &[Message]) -> Result<GenerateResponse, ProviderError> {
        self.seen.lock().push(messages.to_vec());
        match self.replies.lock().pop_front() {
            Some(Ok(text)) => Ok(GenerateResponse {
                content: Some(text),
                finish_reason: "STOP".to_string(),
            }),
            Some(Err(message)) => Err(ProviderError::Api(message)),
            None => Err(ProviderError::Parse("no scripted reply left".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert("users", Record::from_json("alice", json!({"username": "alice_w"})))
        .insert(
            "transactions",
            Record::from_json(
                "t1",
                json!({"user": "alice", "type": "Paid", "amount": 40, "category": "Food", "date": "2024-02-10 12:00:00.000Z"}),
            ),
        )
        .insert(
            "transactions",
            Record::from_json(
                "t2",
                json!({"user": "bob", "type": "Paid", "amount": 900, "category": "Food", "date": "2024-02-11 12:00:00.000Z"}),
            ),
        );
    store
}
