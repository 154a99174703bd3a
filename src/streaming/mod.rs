//! # Streaming Module
//!
//! Transcodes an upstream server-sent event stream of chat completion chunks
//! into a plain byte stream of generated text.
//!
//! ## Pipeline:
//! - [`parser`]: raw chunks to discrete events
//! - [`interpreter`]: one event to emitted text and/or a completion signal
//! - [`relay`]: the driver task and the consumer-facing [`RelayStream`]

pub mod interpreter;
pub mod parser;
pub mod relay;

pub use interpreter::{CompletionSignal, EventInterpreter, Interpretation};
pub use parser::{EventParser, ParsedEvent};
pub use relay::{RelayDriver, RelayEnd, RelayOptions, RelayStats, RelayStream};

use crate::{error::RelayError, schemas::RelayRequest, upstream::UpstreamCall};
use tracing::info;

/// Call the upstream and, once it has accepted the request, relay its
/// response body. Upstream rejections are returned here, before any relay
/// exists.
pub async fn relay_chat<U>(
    upstream: &U,
    request: &RelayRequest,
    buffer: usize,
) -> Result<RelayStream, RelayError>
where
    U: UpstreamCall + ?Sized,
{
    let body = upstream.open(request).await?;
    info!(
        upstream = upstream.name(),
        model = %request.model.id,
        messages = request.messages.len(),
        "Upstream accepted request, relaying stream"
    );

    Ok(RelayStream::spawn(
        body,
        RelayOptions {
            buffer,
            model: request.model.id.clone(),
        },
    ))
}
