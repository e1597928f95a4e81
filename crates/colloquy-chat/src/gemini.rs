//! Gemini streaming client.
//!
//! Calls `models/{model}:streamGenerateContent?alt=sse` and turns the SSE
//! body into a [`ChunkStream`]. Each SSE event carries one
//! `GenerateContentResponse`; its candidate text parts form one chunk.

use std::fmt::Display;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use colloquy_core::config::ChatConfig;
use colloquy_core::credentials::ApiCredential;

use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::service::{ChatChunk, ChatService, ChunkStream};

/// Finish reasons that mean the model refused to answer.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Chat service backed by the Gemini generative-language REST API.
#[derive(Clone)]
pub struct GeminiChatService {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiChatService {
    pub fn new(credential: &ApiCredential, config: &ChatConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: credential.key().to_string(),
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    /// Replace the HTTP client, e.g. to share a connection pool.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!(
            "{}/{}:streamGenerateContent?alt=sse",
            self.api_base, model_path
        )
    }
}

#[async_trait]
impl ChatService for GeminiChatService {
    async fn stream_reply(
        &self,
        context: &ConversationContext,
        query: &str,
    ) -> Result<ChunkStream, ChatError> {
        let body = build_request(context, query);
        let endpoint = self.endpoint();
        tracing::debug!(
            model = %self.model,
            context_messages = context.len(),
            "Sending streamGenerateContent request"
        );

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            tracing::warn!(status = status.as_u16(), "Gemini request rejected");
            return Err(ChatError::Status {
                status: status.as_u16(),
                message: error_message(&body_text),
            });
        }

        Ok(chunk_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

fn build_request<'a>(context: &'a ConversationContext, query: &'a str) -> GenerateContentRequest<'a> {
    let mut contents: Vec<Content<'a>> = context
        .messages()
        .iter()
        .map(|m| Content {
            role: m.role.as_str(),
            parts: vec![Part { text: &m.text }],
        })
        .collect();
    contents.push(Content {
        role: "user",
        parts: vec![Part { text: query }],
    });
    GenerateContentRequest { contents }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Interpret one SSE event payload.
///
/// Returns `Ok(None)` for events that carry no text (e.g. a trailing
/// usage-metadata event).
fn parse_event(data: &str) -> Result<Option<ChatChunk>, ChatError> {
    let response: GenerateContentResponse =
        serde_json::from_str(data).map_err(|e| ChatError::Decode(e.to_string()))?;

    if let Some(err) = response.error {
        return Err(ChatError::Status {
            status: err.code,
            message: err.message,
        });
    }

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ChatError::Blocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(None);
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(Some(ChatChunk { text }));
    }

    match candidate.finish_reason {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(ChatError::Blocked(reason))
        }
        _ => Ok(None),
    }
}

// =============================================================================
// Byte stream -> chunk stream
// =============================================================================

/// Decode an SSE byte stream into chunks. The first error ends the stream.
pub(crate) fn chunk_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display + Send + 'static,
{
    let events = bytes.eventsource().boxed();

    stream::unfold(Some(events), |events| async move {
        let mut events = events?;
        loop {
            let item = match events.next().await? {
                Ok(event) if event.data.is_empty() => continue,
                Ok(event) => match parse_event(&event.data) {
                    Ok(Some(chunk)) => Ok(chunk),
                    Ok(None) => continue,
                    Err(e) => Err(e),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Gemini event stream failed");
                    Err(ChatError::Stream(e.to_string()))
                }
            };
            let next = if item.is_ok() { Some(events) } else { None };
            return Some((item, next));
        }
    })
    .boxed()
}

// =============================================================================
// Tests
// =============================================================================
