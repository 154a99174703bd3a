//! # Schemas Module
//!
//! Wire records for the relay: what callers send in, what goes out to the
//! upstream chat completions endpoint, and the incremental chunks that come
//! back over the event stream.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// # Chat Message
///
/// One prior turn of the conversation. `role` is passed through untouched
/// (`user`, `assistant`, `system`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// Model selected by the caller. Only `id` is sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OpenAIModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl OpenAIModel {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
        }
    }
}

/// # Relay Request
///
/// Everything a caller supplies to start one relay: model, system prompt,
/// credential and conversation so far. An empty `key` falls back to the
/// process-wide default credential.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayRequest {
    pub model: OpenAIModel,
    #[serde(rename = "prompt", default)]
    pub system_prompt: String,
    #[serde(default)]
    pub key: String,
    pub messages: Vec<Message>,
}

/// # Chat Completion Request
///
/// Body posted to the upstream. Always streaming; the system prompt is the
/// first message, followed by the caller's messages in order.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl ChatCompletionRequest {
    pub fn streaming(request: &RelayRequest, max_tokens: u32, temperature: f32) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(Message::system(request.system_prompt.clone()));
        messages.extend(request.messages.iter().cloned());

        Self {
            model: request.model.id.clone(),
            messages,
            max_tokens,
            temperature,
            stream: true,
        }
    }
}

/// # Chat Completion Chunk
///
/// One decoded data event from the upstream stream. Only the fields the
/// relay reads are decoded; everything else (`id`, `index`, `role`, usage,
/// vendor extensions) is ignored whatever its type. A null `choices` is the
/// same as an absent one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Option<Vec<StreamChoice>>,
}

impl ChatCompletionChunk {
    pub fn first_choice(&self) -> Option<&StreamChoice> {
        self.choices.as_deref().and_then(<[StreamChoice]>::first)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Option<StreamDelta>,
    /// Finish reason (null until the final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl StreamChoice {
    /// Incremental text of this choice, empty when the delta carries none.
    pub fn text(&self) -> &str {
        self.delta
            .as_ref()
            .and_then(|delta| delta.content.as_deref())
            .unwrap_or("")
    }

    pub fn is_stop(&self) -> bool {
        self.finish_reason.as_deref() == Some("stop")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error envelope returned by the upstream on non-success status.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: Option<ApiError>,
}
