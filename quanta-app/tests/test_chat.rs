#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{seeded_store, ScriptedProvider};
use quanta_app::chat::{ChatError, ChatRequest, ChatService};
use quanta_providers::Role;

fn request(prompt: &str, user: &str) -> ChatRequest {
    ChatRequest {
        prompt: Some(prompt.to_string()),
        user_id: Some(user.to_string()),
        auth_token: Some("tok".to_string()),
    }
}

#[tokio::test]
async fn test_plain_answer_skips_tools() {
    let provider = ScriptedProvider::new(["Hello! Ask me about your spending."]);
    let store = seeded_store();
    let chat = ChatService::new(provider.clone(), store.clone());

    let answer = chat.answer(request("hi", "alice")).await.unwrap();

    assert_eq!(answer, "Hello! Ask me about your spending.");
    assert_eq!(provider.call_count(), 1);
    assert_eq!(store.call_count(), 0);

    let seen = provider.seen.lock();
    assert_eq!(seen[0][0].role, Role::System);
    assert!(seen[0][0].content.contains("get_user_analytics"));
    assert_eq!(seen[0][1].content, "User question: hi");
}

#[tokio::test]
async fn test_tool_call_feeds_follow_up() {
    let provider = ScriptedProvider::new([
        "Let me look.\nTOOL_CALL: {\"toolName\": \"calculate_spending_by_category\", \"arguments\": {}}",
        "You spent 40 on Food.",
    ]);
    let store = seeded_store();
    let chat = ChatService::new(provider.clone(), store.clone());

    let answer = chat.answer(request("food spend?", "alice")).await.unwrap();
    assert_eq!(answer, "You spent 40 on Food.");

    let seen = provider.seen.lock();
    assert_eq!(seen.len(), 2);
    let follow_up = &seen[1][0].content;
    assert!(follow_up.starts_with("Based on the user's question: \"food spend?\""));
    assert!(follow_up.contains("\"Food\": 40"));
    assert!(!follow_up.contains("900"));

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].auth.as_deref(), Some("tok"));
}

#[tokio::test]
async fn test_tool_failure_appends_note() {
    let provider = ScriptedProvider::new(["TOOL_CALL: {\"toolName\": \"drop_tables\", \"arguments\": {}}"]);
    let chat = ChatService::new(provider.clone(), seeded_store());

    let answer = chat.answer(request("wipe it", "alice")).await.unwrap();

    assert!(answer.ends_with(
        "\n\nNote: I encountered an error while trying to fetch your data: PocketBaseMCP error: Unknown tool: drop_tables"
    ));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_malformed_tool_call_appends_note() {
    let provider = ScriptedProvider::new(["TOOL_CALL: {toolName: oops}"]);
    let chat = ChatService::new(provider.clone(), seeded_store());

    let answer = chat.answer(request("?", "alice")).await.unwrap();
    assert!(answer.starts_with("TOOL_CALL: {toolName: oops}\n\nNote: I encountered an error"));
}

#[tokio::test]
async fn test_follow_up_failure_appends_note() {
    let provider = ScriptedProvider::new(["TOOL_CALL: {\"toolName\": \"get_user_profile\"}"])
        .with_failure("quota exceeded");
    let chat = ChatService::new(provider.clone(), seeded_store());

    let answer = chat.answer(request("who am I", "alice")).await.unwrap();
    assert!(answer.contains("Note: I encountered an error while trying to fetch your data: API error: quota exceeded"));
}

#[tokio::test]
async fn test_first_generation_failure_is_an_error() {
    let provider = ScriptedProvider::new([]).with_failure("unavailable");
    let chat = ChatService::new(provider, seeded_store());

    let err = chat.answer(request("hi", "alice")).await.unwrap_err();
    assert!(matches!(err, ChatError::Provider(_)));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_request_validation() {
    let provider = ScriptedProvider::new([]);
    let store = seeded_store();
    let chat = ChatService::new(provider.clone(), store.clone());

    let err = chat.answer(request("  ", "alice")).await.unwrap_err();
    assert_eq!(err.to_string(), "Prompt is required");

    let err = chat
        .answer(ChatRequest {
            prompt: Some("hi".into()),
            ..ChatRequest::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "User ID is required");

    let err = chat.answer(request("hi", "x\" || user != \"")).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidUser(_)));

    assert_eq!(provider.call_count(), 0);
    assert_eq!(store.call_count(), 0);
}
