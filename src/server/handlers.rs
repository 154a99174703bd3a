//! # Server Handlers

use super::AppState;
use crate::{error::RelayError, schemas::RelayRequest, streaming::relay_chat};
use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json as JsonResponse, Response},
    Json,
};
use tracing::debug;

/// Relay a chat completion as plain text.
///
/// Upstream rejections become an error response before any body is sent.
/// Once streaming has started, a relay error ends the body abruptly.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<RelayRequest>,
) -> Result<Response, RelayError> {
    debug!(
        "Chat request: model={}, messages={}",
        request.model.id,
        request.messages.len()
    );

    let relay = relay_chat(state.upstream(), &request, state.config().relay_buffer).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(relay))
        .map_err(|e| RelayError::Internal(format!("Failed to build response: {}", e)))
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    let health_status = serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "chat-relay",
        "version": env!("CARGO_PKG_VERSION")
    });

    (StatusCode::OK, JsonResponse(health_status))
}
