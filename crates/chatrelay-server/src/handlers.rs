use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatrelay_core::{RelayError, Turn};
use serde::Deserialize;

use crate::error::ApiError;
use crate::presenter;
use crate::state::AppState;

/// Request body for POST /chat.
///
/// `stream` picks the response shape: an SSE stream of fragments (the
/// default) or, when `false`, the whole reply as one JSON assistant turn.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// One entry of the caller-supplied history. Roles are free-form here; only
/// `user` entries matter and everything else is ignored.
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

const USER_ROLE: &str = "user";

fn default_stream() -> bool {
    true
}

/// The content of the last `user` entry, which is the only one the server
/// processes. Missing or blank content is rejected.
pub fn last_user_message(request: &ChatRequest) -> Result<&str, RelayError> {
    request
        .messages
        .iter()
        .rev()
        .find(|message| message.role == USER_ROLE)
        .map(|message| message.content.as_str())
        .filter(|content| !content.trim().is_empty())
        .ok_or(RelayError::NoUserContent)
}

pub async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!("rejected chat body: {}", e);
        ApiError::bad_request("Invalid JSON body")
    })?;
    let message = last_user_message(&request)?.to_string();

    let reply = state.service.process_message(message).await?;

    if request.stream {
        Ok(presenter::sse_response(reply).into_response())
    } else {
        let content = reply.collect_text().await;
        Ok(Json(Turn::assistant(content)).into_response())
    }
}

pub async fn handle_history(State(state): State<AppState>) -> Json<Vec<Turn>> {
    Json(state.service.history())
}

pub async fn handle_health() -> &'static str {
    "OK"
}
