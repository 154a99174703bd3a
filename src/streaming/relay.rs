//! # Relay Stream
//!
//! A driver task pulls events from the [`EventParser`], runs each through the
//! [`EventInterpreter`] and pushes emitted text into a bounded channel. The
//! consumer reads plain bytes from [`RelayStream`].
//!
//! Lifecycle is OPEN until the upstream is exhausted, then CLOSED (the
//! sender is dropped). A processing error is delivered as the last item and
//! also closes the relay. The upstream body is owned by the driver and is
//! dropped on every exit path, which releases the connection.

use super::{
    interpreter::{EventInterpreter, Interpretation},
    parser::{EventParser, ParseError, ParsedEvent},
};
use crate::{error::RelayError, upstream::ByteStream};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_RELAY_BUFFER: usize = 16;

/// Item delivered to the relay consumer.
pub type RelayItem = Result<Bytes, RelayError>;

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Capacity of the queue between driver and consumer
    pub buffer: usize,
    /// Model id, recorded on the relay's tracing span
    pub model: String,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_RELAY_BUFFER,
            model: String::new(),
        }
    }
}

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Input exhausted after a completion marker was seen
    Signalled,
    /// Input exhausted without any completion marker
    ImplicitEndOfInput,
    /// Upstream body failed mid-stream; treated as end of input
    TransportInterrupted,
    /// A processing error was delivered to the consumer
    Failed,
    /// The consumer stopped reading
    ConsumerGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub events: usize,
    pub fragments: usize,
    pub bytes: usize,
    pub end: RelayEnd,
}

/// Owns one relay operation: the parser (and through it the upstream body),
/// the interpreter and its completion signal, and the sending half of the
/// output queue.
pub struct RelayDriver {
    parser: EventParser,
    interpreter: EventInterpreter,
    tx: mpsc::Sender<RelayItem>,
    events: usize,
    fragments: usize,
    bytes: usize,
}

impl RelayDriver {
    pub fn new(body: ByteStream, tx: mpsc::Sender<RelayItem>) -> Self {
        Self {
            parser: EventParser::new(body),
            interpreter: EventInterpreter::new(),
            tx,
            events: 0,
            fragments: 0,
            bytes: 0,
        }
    }

    fn stats(&self, end: RelayEnd) -> RelayStats {
        RelayStats {
            events: self.events,
            fragments: self.fragments,
            bytes: self.bytes,
            end,
        }
    }

    /// Drive the relay to completion. Consumes the driver so the upstream
    /// body and the sender are dropped when this returns.
    pub async fn run(mut self) -> RelayStats {
        let end = self.pump().await;
        let stats = self.stats(end);

        match end {
            RelayEnd::Signalled => info!(
                events = stats.events,
                fragments = stats.fragments,
                bytes = stats.bytes,
                "Closing the stream after all data has been processed"
            ),
            RelayEnd::ImplicitEndOfInput | RelayEnd::TransportInterrupted => warn!(
                events = stats.events,
                fragments = stats.fragments,
                bytes = stats.bytes,
                end = ?end,
                "Upstream ended without a completion marker, closing the stream"
            ),
            RelayEnd::Failed | RelayEnd::ConsumerGone => debug!(
                events = stats.events,
                fragments = stats.fragments,
                end = ?end,
                "Relay stopped early"
            ),
        }

        stats
    }

    async fn pump(&mut self) -> RelayEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.tx.closed() => return RelayEnd::ConsumerGone,
                next = self.parser.next_event() => next,
            };

            let event = match next {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(ParseError::Framing(message))) => {
                    error!("Error while framing stream data: {}", message);
                    return self.fail(RelayError::EventStream(message)).await;
                }
                Some(Err(ParseError::Transport(err))) => {
                    warn!("Upstream body interrupted: {}", err);
                    return RelayEnd::TransportInterrupted;
                }
            };

            let data = match event {
                ParsedEvent::ReconnectInterval(interval) => {
                    debug!(?interval, "Ignoring reconnection interval");
                    continue;
                }
                ParsedEvent::Content(data) => data,
            };
            self.events += 1;

            match self.interpreter.interpret(&data) {
                Ok(Interpretation::Fragment(text)) => {
                    self.fragments += 1;
                    self.bytes += text.len();
                    if self.tx.send(Ok(Bytes::from(text))).await.is_err() {
                        return RelayEnd::ConsumerGone;
                    }
                }
                Ok(Interpretation::Completed) | Ok(Interpretation::NoChoices) => {}
                Err(err) => {
                    error!("Error while processing stream data: {}", err);
                    return self.fail(err).await;
                }
            }
        }

        if self.interpreter.signal().is_raised() {
            RelayEnd::Signalled
        } else {
            RelayEnd::ImplicitEndOfInput
        }
    }

    async fn fail(&mut self, err: RelayError) -> RelayEnd {
        // A consumer that already left cannot observe the error
        let _ = self.tx.send(Err(err)).await;
        RelayEnd::Failed
    }
}

/// Consumer side of a relay: the generated text as UTF-8 bytes, in order.
/// Ends after the upstream is drained, or after yielding one error.
/// Dropping it stops the driver and releases the upstream connection.
pub struct RelayStream {
    inner: ReceiverStream<RelayItem>,
}

impl RelayStream {
    /// Start relaying `body` on a new task.
    pub fn spawn(body: ByteStream, options: RelayOptions) -> Self {
        let (tx, rx) = mpsc::channel(options.buffer.max(1));
        let relay_id = format!("relay-{}", &Uuid::new_v4().to_string()[..8]);
        let span = tracing::info_span!("relay", relay_id = %relay_id, model = %options.model);

        tokio::spawn(
            async move {
                debug!("Relay opened");
                RelayDriver::new(body, tx).run().await;
            }
            .instrument(span),
        );

        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Read the relay to its end and return the text. Fails with the relay's
    /// error if one is delivered.
    pub async fn read_to_string(mut self) -> Result<String, RelayError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        String::from_utf8(buffer.to_vec())
            .map_err(|e| RelayError::Internal(format!("Relay produced invalid UTF-8: {}", e)))
    }
}

impl Stream for RelayStream {
    type Item = RelayItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
