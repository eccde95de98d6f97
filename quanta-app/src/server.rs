//! HTTP surface: `POST /api/ai`, `GET /api/tools`, `GET /health`.

use crate::chat::{ChatError, ChatRequest, ChatService};
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use quanta_tools::{list_tools, ToolDescriptor};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat: Arc::new(chat),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ai", post(handle_ai))
        .route("/api/tools", get(handle_tools))
        .route("/health", get(handle_health))
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")
}

async fn handle_ai(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected chat body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid request body: {}", e) })),
            );
        }
    };

    match state.chat.answer(request).await {
        Ok(response) => (StatusCode::OK, Json(json!({ "response": response }))),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &ChatError) -> (StatusCode, Json<Value>) {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        error!(error = %e, "chat request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({ "error": e.to_string() })))
}

async fn handle_tools() -> Json<Vec<ToolDescriptor>> {
    Json(list_tools())
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
