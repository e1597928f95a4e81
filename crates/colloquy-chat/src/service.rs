//! Chat-service abstraction.
//!
//! A chat service takes the session's prior context plus a new query and
//! answers with a lazy, finite stream of text chunks.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::context::{ContextMessage, ConversationContext};
use crate::error::ChatError;

/// One incremental piece of a streamed model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub text: String,
}

impl ChatChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Stream of chunks in generation order. Not restartable.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, ChatError>>;

/// A remote generative-language service.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Start a streamed reply to `query`, given the prior conversation.
    ///
    /// Errors raised before the first chunk are returned directly; errors
    /// raised mid-stream arrive as an `Err` item, after which the stream ends.
    async fn stream_reply(
        &self,
        context: &ConversationContext,
        query: &str,
    ) -> Result<ChunkStream, ChatError>;

    /// Service name for logging.
    fn name(&self) -> &str;
}

// =============================================================================
// Scripted implementation
// =============================================================================

#[derive(Debug, Clone)]
enum ScriptedFailure {
    OnStart(String),
    AfterChunks(usize, String),
}

/// Chat service that replays a fixed list of chunks.
///
/// Used for tests and offline development. Records every call so tests can
/// inspect the context each call received.
#[derive(Debug)]
pub struct ScriptedChatService {
    chunks: Vec<String>,
    failure: Option<ScriptedFailure>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(Vec<ContextMessage>, String)>>,
}

impl ScriptedChatService {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            failure: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail before any chunk is produced.
    pub fn failing_on_start(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(ScriptedFailure::OnStart(message.into()));
        self
    }

    /// Emit the first `n` chunks, then fail.
    pub fn failing_after(mut self, n: usize, message: impl Into<String>) -> Self {
        self.failure = Some(ScriptedFailure::AfterChunks(n, message.into()));
        self
    }

    /// Wait this long before answering, like a slow remote model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far, as (context messages, query).
    pub fn calls(&self) -> Vec<(Vec<ContextMessage>, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatService for ScriptedChatService {
    async fn stream_reply(
        &self,
        context: &ConversationContext,
        query: &str,
    ) -> Result<ChunkStream, ChatError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((context.messages().to_vec(), query.to_string()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let items: Vec<Result<ChatChunk, ChatError>> = match &self.failure {
            Some(ScriptedFailure::OnStart(message)) => {
                return Err(ChatError::Request(message.clone()));
            }
            Some(ScriptedFailure::AfterChunks(n, message)) => self
                .chunks
                .iter()
                .take(*n)
                .map(|c| Ok(ChatChunk::new(c.clone())))
                .chain(std::iter::once(Err(ChatError::Stream(message.clone()))))
                .collect(),
            None => self
                .chunks
                .iter()
                .map(|c| Ok(ChatChunk::new(c.clone())))
                .collect(),
        };

        tracing::debug!(chunks = items.len(), "Scripted reply prepared");
        Ok(stream::iter(items).boxed())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
