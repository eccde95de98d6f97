//! Caller-supplied filters can narrow a query but never widen it past the
//! bound user.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::parse_text;
use proptest::prelude::*;
use quanta_store::{MemoryStore, Record};
use quanta_tools::{SecurityContext, ToolCall, ToolDispatcher, ToolError};
use serde_json::json;
use std::sync::Arc;

const FRAGMENTS: &[&str] = &[
    "amount > 0",
    "user != \"alice\"",
    "user = \"bob\"",
    "user ~ \"b\"",
    "true",
    "1 = 1",
    "(",
    ")",
    "||",
    "&&",
    "\"",
    "\\",
    "\") || (user = \"bob",
    "category = \"Food\"",
    "id != \"\"",
    "type = \"Paid\"",
    "user = null",
    "//",
    "@request.auth.id",
];

fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (id, user) in [("a1", "alice"), ("a2", "alice"), ("b1", "bob"), ("b2", "bob"), ("n1", "")] {
        store.insert(
            "transactions",
            Record::from_json(id, json!({"user": user, "amount": 10, "type": "Paid", "category": "Food"})),
        );
    }
    store
}

fn filter_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 1..6).prop_map(|parts| parts.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn built_filter_always_ends_with_owner_clause(extra in filter_strategy()) {
        let ctx = SecurityContext::new("alice", None).unwrap();
        match ctx.user_filter(Some(&extra)) {
            Ok(filter) => {
                prop_assert!(filter.ends_with(") && user = \"alice\""), "{}", filter);
            }
            Err(e) => prop_assert!(matches!(e, ToolError::Validation(_))),
        }
    }

    #[test]
    fn listing_never_returns_foreign_records(extra in filter_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let store = store();
        let mut dispatcher = ToolDispatcher::new(store.clone());
        dispatcher.set_current_user("alice", None).unwrap();

        let call = ToolCall::new(
            "list_user_records",
            json!({"collection": "transactions", "filter": extra, "perPage": 500}),
        );
        match runtime.block_on(dispatcher.execute_tool(&call)) {
            Ok(response) => {
                let page = parse_text(&response).unwrap();
                for item in page["items"].as_array().unwrap() {
                    prop_assert_eq!(item["user"].as_str(), Some("alice"));
                }
            }
            Err(e) => {
                prop_assert!(matches!(e.kind(), ToolError::Validation(_)), "{}", e);
                prop_assert_eq!(store.call_count(), 0);
            }
        }
    }
}

#[test]
fn test_parenthesis_breakout_is_rejected() {
    let ctx = SecurityContext::new("alice", None).unwrap();
    for attempt in [
        "amount > 0) || (user != \"alice\"",
        "amount > 0) || user = \"bob\" || (amount > 0",
        "user = \"bob\" ||",
    ] {
        assert!(
            matches!(ctx.user_filter(Some(attempt)), Err(ToolError::Validation(_))),
            "accepted {}",
            attempt
        );
    }
}

#[test]
fn test_or_filter_stays_grouped() {
    let ctx = SecurityContext::new("alice", None).unwrap();
    let filter = ctx.user_filter(Some("user = \"bob\" || amount > 0")).unwrap();
    assert_eq!(filter, "(user = \"bob\" || amount > 0) && user = \"alice\"");
}
