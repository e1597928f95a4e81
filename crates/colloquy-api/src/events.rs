//! Server-sent events for chat progress.
//!
//! An action runs in its own task and reports through an [`EventSink`]; the
//! handler returns the receiving end as an SSE response. Event names:
//! `notice`, `turn`, `chunk`, `response`, `error`.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};

use colloquy_chat::ResponseSink;
use colloquy_core::types::{Speaker, Turn};

use crate::error::ErrorBody;

/// A history turn as sent to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub speaker: Speaker,
    pub label: String,
    pub text: String,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            speaker: turn.speaker(),
            label: turn.speaker().display_label().to_string(),
            text: turn.text().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

/// Severity of a notice shown above the response box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticePayload {
    pub level: NoticeLevel,
    pub text: String,
}

/// Forwards action progress to an SSE response.
///
/// Sends are best-effort: if the client went away the action still runs to
/// completion and its turns are still recorded.
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    pub fn notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.send(
            "notice",
            &NoticePayload {
                level,
                text: text.into(),
            },
        );
    }

    pub fn error(&mut self, body: ErrorBody) {
        self.send("error", &body);
    }

    fn send<T: Serialize>(&mut self, name: &str, payload: &T) {
        match Event::default().event(name).json_data(payload) {
            Ok(event) => {
                if self.tx.send(event).is_err() {
                    tracing::debug!(event = name, "Client disconnected; event dropped");
                }
            }
            Err(e) => tracing::warn!(event = name, error = %e, "Failed to encode event"),
        }
    }
}

impl ResponseSink for EventSink {
    fn on_turn(&mut self, turn: &Turn) {
        self.send("turn", &TurnView::from(turn));
    }

    fn on_chunk(&mut self, text: &str) {
        self.send(
            "chunk",
            &TextPayload {
                text: text.to_string(),
            },
        );
    }

    fn on_response(&mut self, text: &str) {
        self.send(
            "response",
            &TextPayload {
                text: text.to_string(),
            },
        );
    }
}

/// Open a channel whose receiving end becomes an SSE response.
pub fn channel() -> (
    EventSink,
    Sse<impl Stream<Item = Result<Event, Infallible>> + Send>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = UnboundedReceiverStream::new(rx).map(Ok::<Event, Infallible>);
    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));
    (EventSink::new(tx), sse)
}
