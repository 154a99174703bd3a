//! # Event Interpreter
//!
//! Decides what one data-bearing event means for the relay: text to emit,
//! a completion signal, or nothing. The [`CompletionSignal`] lives here and
//! is only ever raised by [`EventInterpreter::interpret`].

use crate::{error::RelayError, schemas::ChatCompletionChunk};
use serde::Deserialize;
use tracing::debug;

/// Literal terminator used by the OpenAI wire format.
pub const DONE_MARKER: &str = "[DONE]";

/// One-way completion flag: starts lowered, can be raised, never reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSignal(bool);

impl CompletionSignal {
    pub fn raise(&mut self) {
        self.0 = true;
    }

    pub fn is_raised(&self) -> bool {
        self.0
    }
}

/// Outcome of interpreting one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// Text to forward. May be empty.
    Fragment(String),
    /// Out-of-band completion sentinel; nothing to emit
    Completed,
    /// Chunk without choices
    NoChoices,
}

#[derive(Deserialize)]
struct StatusMarker {
    status: String,
}

/// Payload is `[DONE]` or a JSON object whose top-level `status` is `"done"`.
pub fn is_completion_sentinel(data: &str) -> bool {
    let data = data.trim();
    if data == DONE_MARKER {
        return true;
    }
    if !data.contains("status") {
        return false;
    }
    serde_json::from_str::<StatusMarker>(data)
        .map(|marker| marker.status == "done")
        .unwrap_or(false)
}

#[derive(Debug, Default)]
pub struct EventInterpreter {
    signal: CompletionSignal,
}

impl EventInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> CompletionSignal {
        self.signal
    }

    pub fn interpret(&mut self, data: &str) -> Result<Interpretation, RelayError> {
        if is_completion_sentinel(data) {
            debug!("Stream has been signalled to close");
            self.signal.raise();
            return Ok(Interpretation::Completed);
        }

        let chunk: ChatCompletionChunk =
            serde_json::from_str(data).map_err(|source| RelayError::MalformedEvent {
                data: data.to_string(),
                source,
            })?;

        let Some(choice) = chunk.first_choice() else {
            return Ok(Interpretation::NoChoices);
        };

        if choice.is_stop() {
            debug!("Received stop signal, will close after processing all data");
            self.signal.raise();
        }

        Ok(Interpretation::Fragment(choice.text().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str) -> Interpretation {
        Interpretation::Fragment(text.to_string())
    }

    #[test]
    fn test_content_fragment() {
        let mut interpreter = EventInterpreter::new();
        let outcome = interpreter
            .interpret(r#"{"choices":[{"delta":{"content":"Hello"}}]}"#)
            .unwrap();

        assert_eq!(outcome, fragment("Hello"));
        assert!(!interpreter.signal().is_raised());
    }

    #[test]
    fn test_absent_content_is_empty_fragment() {
        let mut interpreter = EventInterpreter::new();
        let outcome = interpreter
            .interpret(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#)
            .unwrap();
        assert_eq!(outcome, fragment(""));
    }

    #[test]
    fn test_status_done_sentinel() {
        let mut interpreter = EventInterpreter::new();
        assert_eq!(
            interpreter.interpret(r#"{"status": "done"}"#).unwrap(),
            Interpretation::Completed
        );
        assert!(interpreter.signal().is_raised());

        assert!(is_completion_sentinel(r#"{"status":"done"}"#));
        assert!(is_completion_sentinel(" [DONE] "));
        assert!(!is_completion_sentinel(r#"{"status": "running"}"#));
        assert!(!is_completion_sentinel(r#"{"choices":[{"delta":{"content":"status"}}]}"#));
    }

    #[test]
    fn test_nested_status_is_not_a_sentinel() {
        let mut interpreter = EventInterpreter::new();
        assert!(!is_completion_sentinel(r#"{"result":{"status": "done"}}"#));
        assert_eq!(
            interpreter.interpret(r#"{"result":{"status": "done"}}"#).unwrap(),
            Interpretation::NoChoices
        );
        assert!(!interpreter.signal().is_raised());
    }

    #[test]
    fn test_stop_keeps_fragment() {
        let mut interpreter = EventInterpreter::new();
        let outcome = interpreter
            .interpret(r#"{"choices":[{"delta":{"content":"bye"},"finish_reason":"stop"}]}"#)
            .unwrap();

        assert_eq!(outcome, fragment("bye"));
        assert!(interpreter.signal().is_raised());
    }

    #[test]
    fn test_other_finish_reason_does_not_signal() {
        let mut interpreter = EventInterpreter::new();
        interpreter
            .interpret(r#"{"choices":[{"delta":{"content":"x"},"finish_reason":"length"}]}"#)
            .unwrap();
        assert!(!interpreter.signal().is_raised());
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let mut interpreter = EventInterpreter::new();
        let outcome = interpreter
            .interpret(
                r#"{"choices":[{"index":0,"delta":{"content":"a"}},{"index":1,"delta":{"content":"b"},"finish_reason":"stop"}]}"#,
            )
            .unwrap();
        assert_eq!(outcome, fragment("a"));
        assert!(!interpreter.signal().is_raised());
    }

    #[test]
    fn test_empty_choices_is_noop() {
        let mut interpreter = EventInterpreter::new();
        assert_eq!(
            interpreter.interpret(r#"{"choices":[]}"#).unwrap(),
            Interpretation::NoChoices
        );
        assert_eq!(
            interpreter.interpret(r#"{"usage":{"total_tokens":3}}"#).unwrap(),
            Interpretation::NoChoices
        );
        assert_eq!(
            interpreter.interpret(r#"{"choices":null}"#).unwrap(),
            Interpretation::NoChoices
        );
        assert!(!interpreter.signal().is_raised());
    }

    #[test]
    fn test_unread_fields_do_not_break_decoding() {
        let mut interpreter = EventInterpreter::new();
        let outcome = interpreter
            .interpret(r#"{"id":42,"choices":[{"index":-1,"delta":{"content":"x"}}]}"#)
            .unwrap();
        assert_eq!(outcome, fragment("x"));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let mut interpreter = EventInterpreter::new();
        let err = interpreter.interpret("not json").unwrap_err();
        match err {
            RelayError::MalformedEvent { data, .. } => assert_eq!(data, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!interpreter.signal().is_raised());
    }

    #[test]
    fn test_signal_is_never_lowered() {
        let mut interpreter = EventInterpreter::new();
        interpreter.interpret(r#"{"status":"done"}"#).unwrap();
        interpreter
            .interpret(r#"{"choices":[{"delta":{"content":"late"}}]}"#)
            .unwrap();
        assert!(interpreter.signal().is_raised());
    }
}
