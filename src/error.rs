#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
#[cfg(feature = "server")]
use serde_json::json;
use serde_json::Value;
use thiserror::Error;

/// # Upstream API Error
///
/// Structured error returned by an OpenAI-compatible upstream inside an
/// `{"error": {...}}` envelope. Fields are carried exactly as the upstream
/// sent them; anything the upstream omitted stays `None`. `param` and `code`
/// are strings for OpenAI but numbers for some compatible servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiError {
    /// Human readable message
    #[serde(default)]
    pub message: String,
    /// Error category (e.g. `invalid_request_error`)
    #[serde(rename = "type", default)]
    pub r#type: Option<String>,
    /// Request parameter the error refers to
    #[serde(default)]
    pub param: Option<Value>,
    /// Machine readable error code
    #[serde(default)]
    pub code: Option<Value>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.r#type {
            Some(kind) => write!(f, "{} ({})", self.message, kind),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// Upstream rejected the request with a structured error body
    #[error("OpenAI API error: {0}")]
    Api(ApiError),
    /// Upstream rejected the request without a structured error body
    #[error("OpenAI API returned an error: {message}")]
    Upstream { status: u16, message: String },
    /// A data-bearing event whose payload is not a chat completion chunk
    #[error("Malformed event payload {data:?}: {source}")]
    MalformedEvent {
        data: String,
        #[source]
        source: serde_json::Error,
    },
    /// The byte stream could not be framed into events
    #[error("Event stream error: {0}")]
    EventStream(String),
    /// The upstream could not be reached
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Internal Error: {0}")]
    Internal(String),
}

impl RelayError {
    /// OpenAI-style `type` string used when the error is reported over HTTP.
    pub fn kind(&self) -> &str {
        match self {
            RelayError::Api(err) => err.r#type.as_deref().unwrap_or("api_error"),
            RelayError::Upstream { .. } | RelayError::Transport(_) => "upstream_error",
            RelayError::MalformedEvent { .. } | RelayError::EventStream(_) => "invalid_event",
            RelayError::BadRequest(_) => "invalid_request_error",
            RelayError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(feature = "server")]
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Api(_)
            | RelayError::Upstream { .. }
            | RelayError::Transport(_)
            | RelayError::MalformedEvent { .. }
            | RelayError::EventStream(_) => StatusCode::BAD_GATEWAY,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            RelayError::Api(err) => json!({
                "error": {
                    "message": err.message,
                    "type": err.r#type,
                    "param": err.param,
                    "code": err.code,
                }
            }),
            other => json!({
                "error": {
                    "message": other.to_string(),
                    "type": other.kind(),
                    "param": null,
                    "code": null,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// # From Trait Implementations for Better Error Handling
///
/// These allow `?` on the common library errors met while talking to the
/// upstream, classifying each the way the relay reports it.
impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Transport("Request timeout - upstream did not respond in time".to_string())
        } else if err.is_connect() {
            RelayError::Transport("Connection failed - unable to reach upstream".to_string())
        } else if err.is_builder() {
            RelayError::BadRequest(format!("Invalid request: {}", err))
        } else if let Some(status) = err.status() {
            RelayError::Upstream {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RelayError::Transport(format!("HTTP client error: {}", err))
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Internal(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for RelayError {
    fn from(err: url::ParseError) -> Self {
        RelayError::BadRequest(format!("Invalid URL: {}", err))
    }
}
