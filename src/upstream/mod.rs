//! # Upstream Call
//!
//! The relay core never talks HTTP itself. It is handed a byte stream by an
//! [`UpstreamCall`], which is responsible for building and sending the
//! request and for turning a rejected request into a typed error before any
//! event parsing begins.

use crate::{error::RelayError, schemas::RelayRequest};
use bytes::Bytes;
use futures_util::stream::Stream;
use std::pin::Pin;

pub mod openai;

pub use openai::OpenAIUpstream;

/// Raw response body of a successful upstream call, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

/// Issues the outbound chat completion request.
#[async_trait::async_trait]
pub trait UpstreamCall: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Send the request. On a success status the streaming body is returned
    /// untouched; anything else becomes [`RelayError::Api`] or
    /// [`RelayError::Upstream`].
    async fn open(&self, request: &RelayRequest) -> Result<ByteStream, RelayError>;
}
