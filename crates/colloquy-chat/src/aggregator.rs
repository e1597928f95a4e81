//! Turns a streamed reply into history turns and one aggregate response.

use std::sync::Arc;

use futures::StreamExt;

use colloquy_core::types::Turn;

use crate::context::ChatSession;
use crate::error::ChatError;
use crate::service::ChatService;

/// Appended after every chunk when building the aggregate response.
pub const CHUNK_SEPARATOR: &str = "\n";

/// Receives rendering callbacks while a reply streams in.
///
/// `on_turn` fires for every turn appended to the history. `on_chunk` fires
/// once per chunk, in order, after that chunk's bot turn. `on_response`
/// fires once, only if the stream completed.
pub trait ResponseSink: Send {
    fn on_turn(&mut self, _turn: &Turn) {}
    fn on_chunk(&mut self, _text: &str) {}
    fn on_response(&mut self, _text: &str) {}
}

impl ResponseSink for () {}

/// Result of a completed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedResponse {
    /// Every chunk followed by [`CHUNK_SEPARATOR`].
    pub text: String,
    pub chunk_count: usize,
}

pub struct ResponseAggregator {
    service: Arc<dyn ChatService>,
}

impl ResponseAggregator {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self { service }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Submit `query` on behalf of the session.
    ///
    /// The user turn is appended before the call. Each chunk becomes a bot
    /// turn as it arrives. If the stream fails, turns already appended stay
    /// and the error is returned; the context only grows on a successful,
    /// non-empty reply.
    pub async fn submit(
        &self,
        session: &mut ChatSession,
        query: &str,
        sink: &mut dyn ResponseSink,
    ) -> Result<AggregatedResponse, ChatError> {
        let user_turn = Turn::user(query);
        session.history.push(user_turn.clone());
        sink.on_turn(&user_turn);

        let mut stream = self.service.stream_reply(&session.context, query).await?;

        let mut buffer = String::new();
        let mut reply = String::new();
        let mut chunk_count = 0usize;

        while let Some(item) = stream.next().await {
            let chunk = item?;
            let turn = Turn::bot(chunk.text.as_str());
            session.history.push(turn.clone());
            sink.on_turn(&turn);
            sink.on_chunk(&chunk.text);

            buffer.push_str(&chunk.text);
            buffer.push_str(CHUNK_SEPARATOR);
            reply.push_str(&chunk.text);
            chunk_count += 1;
        }

        // The model rejects empty text parts on replay.
        if reply.is_empty() {
            tracing::debug!(session_id = %session.id, "Empty reply left out of context");
        } else {
            session.context.record_exchange(query, reply);
        }
        sink.on_response(&buffer);

        tracing::debug!(
            session_id = %session.id,
            service = self.service.name(),
            chunks = chunk_count,
            "Reply aggregated"
        );

        Ok(AggregatedResponse {
            text: buffer,
            chunk_count,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
