//! # OpenAI Upstream
//!
//! [`UpstreamCall`] over reqwest for OpenAI and OpenAI-compatible endpoints.
//! Bearer token authentication, optional organization header, and the
//! fixed streaming request body.

use super::{ByteStream, UpstreamCall};
use crate::{
    config::Config,
    error::RelayError,
    schemas::{ApiErrorResponse, ChatCompletionRequest, RelayRequest},
};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use tracing::debug;

pub const ORGANIZATION_HEADER: &str = "OpenAI-Organization";

#[derive(Clone, Debug)]
pub struct OpenAIUpstream {
    /// Full chat completions URL
    url: String,
    client: Client,
    /// Used when a request arrives without its own key
    default_key: Option<String>,
    organization: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIUpstream {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
            default_key: None,
            organization: None,
            max_tokens: 1000,
            temperature: 1.0,
        }
    }

    pub fn from_config(config: &Config, client: Client) -> Self {
        Self {
            url: config.completions_url(),
            client,
            default_key: config.api_key.clone(),
            organization: config.organization.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn with_default_key(mut self, key: impl Into<String>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request's own key, or the default when the request's key is empty.
    pub fn effective_key<'a>(&'a self, request_key: &'a str) -> Option<&'a str> {
        if !request_key.is_empty() {
            return Some(request_key);
        }
        self.default_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Turn a non-success response into the error surfaced to the caller.
    /// The body is only inspected for an `{"error": {...}}` envelope; it is
    /// never treated as an event stream.
    async fn rejection(status: StatusCode, response: Response) -> RelayError {
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Failed to read upstream error body: {}", e);
                Bytes::new()
            }
        };

        if let Ok(ApiErrorResponse { error: Some(error) }) = serde_json::from_slice(&body) {
            return RelayError::Api(error);
        }

        let text = String::from_utf8_lossy(&body).trim().to_string();
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("unknown status").to_string()
        } else {
            text
        };

        RelayError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait::async_trait]
impl UpstreamCall for OpenAIUpstream {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn open(&self, request: &RelayRequest) -> Result<ByteStream, RelayError> {
        let key = self.effective_key(&request.key).ok_or_else(|| {
            RelayError::BadRequest("No API key provided and no OPENAI_API_KEY configured".to_string())
        })?;

        let body = ChatCompletionRequest::streaming(request, self.max_tokens, self.temperature);
        debug!(
            "Opening upstream stream: model={}, messages={}",
            body.model,
            body.messages.len()
        );

        let mut builder = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(key)
            .json(&body);

        if let Some(organization) = &self.organization {
            builder = builder.header(ORGANIZATION_HEADER, organization);
        }

        let response = builder.send().await.map_err(|e| {
            debug!("Upstream request failed: {}", e);
            RelayError::from(e)
        })?;

        let status = response.status();
        debug!("Upstream response status: {}", status);

        if status != StatusCode::OK {
            return Err(Self::rejection(status, response).await);
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(RelayError::from)),
        ))
    }
}
