//! # Event Parser
//!
//! Frames the upstream byte stream into server-sent events using
//! `eventsource-stream`, which buffers partial lines and partial UTF-8
//! sequences across chunk boundaries. Events come out strictly in the order
//! their encoding appeared in the byte stream.
//!
//! The next chunk is only pulled from the upstream once every event already
//! buffered has been handed out, so a caller that processes each event before
//! asking for the next one gets chunk-level backpressure for free.

use crate::{error::RelayError, upstream::ByteStream};
use eventsource_stream::{EventStream, EventStreamError, Eventsource};
use futures_util::StreamExt;
use std::time::Duration;
use tracing::trace;

/// One unit recovered from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// A data-bearing event; the payload is the joined `data:` lines
    Content(String),
    /// A `retry:` directive that arrived in the same event as data. A
    /// block holding only `retry:` carries no data and is discarded
    /// during framing.
    ReconnectInterval(Duration),
}

/// Why the parser could not produce the next event.
#[derive(Debug)]
pub enum ParseError {
    /// The bytes could not be framed into events (e.g. invalid UTF-8)
    Framing(String),
    /// The upstream body itself failed mid-stream
    Transport(RelayError),
}

pub struct EventParser {
    events: EventStream<ByteStream>,
    /// Content of an event whose `retry:` directive was handed out first
    pending: Option<String>,
}

impl EventParser {
    pub fn new(body: ByteStream) -> Self {
        Self {
            events: body.eventsource(),
            pending: None,
        }
    }

    /// Next event, or `None` once the byte stream is exhausted.
    pub async fn next_event(&mut self) -> Option<Result<ParsedEvent, ParseError>> {
        if let Some(data) = self.pending.take() {
            return Some(Ok(ParsedEvent::Content(data)));
        }

        match self.events.next().await? {
            Ok(event) => {
                trace!(event = %event.event, id = %event.id, data = %event.data, "sse event");
                match event.retry {
                    Some(interval) => {
                        self.pending = Some(event.data);
                        Some(Ok(ParsedEvent::ReconnectInterval(interval)))
                    }
                    None => Some(Ok(ParsedEvent::Content(event.data))),
                }
            }
            Err(EventStreamError::Transport(err)) => Some(Err(ParseError::Transport(err))),
            Err(err) => Some(Err(ParseError::Framing(err.to_string()))),
        }
    }
}
