//! Route handler functions for all API endpoints.
//!
//! Chat actions (`ask`, `speak`) run in a spawned task that holds the
//! session lock for the whole action and streams progress back as SSE.
//! Validation and session lookup happen first, so those failures are plain
//! JSON errors with a 4xx status.

use std::convert::Infallible;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use uuid::Uuid;

use colloquy_chat::ChatSessionSummary;
use colloquy_core::types::SessionHistory;
use colloquy_speech::{SpeechOutcome, LISTENING_NOTICE};

use crate::error::{ApiError, ErrorBody};
use crate::events::{self, NoticeLevel, TurnView};
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<ChatSessionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub turns: Vec<TurnView>,
}

impl HistoryResponse {
    fn new(session_id: Uuid, history: &SessionHistory) -> Self {
        Self {
            session_id,
            turns: history.iter().map(TurnView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescriptionResponse {
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub chat_model: String,
    pub speech_enabled: bool,
}

// =============================================================================
// Page and health
// =============================================================================

/// GET / and GET /ui - serve the chat page.
pub async fn ui(State(state): State<AppState>) -> impl IntoResponse {
    Html(colloquy_ui::render_page(&state.config.general.page_title))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.session_count(),
        chat_model: state.config.chat.model.clone(),
        speech_enabled: state.voice.is_some(),
    })
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let id = state.orchestrator.create_session()?;
    Ok((StatusCode::CREATED, Json(SessionCreated { id })))
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<SessionList>, ApiError> {
    Ok(Json(SessionList {
        sessions: state.orchestrator.list_sessions()?,
    }))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.delete_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/{id}/history
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.orchestrator.history(id).await?;
    Ok(Json(HistoryResponse::new(id, &history)))
}

/// DELETE /api/sessions/{id}/history - "Clear Chat History".
pub async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let shared = state.orchestrator.session(id)?;
    let mut session = shared.lock().await;
    state.orchestrator.clear_history(&mut session);
    Ok(Json(HistoryResponse::new(id, &session.history)))
}

// =============================================================================
// Chat actions
// =============================================================================

/// POST /api/sessions/{id}/ask - typed question, answered as SSE.
pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    state.orchestrator.validate_query(&body.query)?;
    let shared = state.orchestrator.session(id)?;
    let (mut sink, sse) = events::channel();

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let mut session = shared.lock().await;
        if let Err(e) = orchestrator
            .submit_text(&mut session, &body.query, &mut sink)
            .await
        {
            sink.error(chat_failure(e));
        }
    });

    Ok(sse)
}

/// POST /api/sessions/{id}/speak - capture one utterance, then answer it.
pub async fn speak(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let voice = state
        .voice
        .clone()
        .ok_or(ApiError::from(colloquy_speech::SpeechError::Disabled))?;
    let shared = state.orchestrator.session(id)?;
    let (mut sink, sse) = events::channel();

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let mut session = shared.lock().await;
        sink.notice(NoticeLevel::Info, LISTENING_NOTICE);

        let listened = voice.listen().await;
        orchestrator.finish_action(&mut session);
        let outcome = match listened {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Speech capture failed");
                sink.error(ApiError::from(e).into_body());
                return;
            }
        };

        match outcome {
            SpeechOutcome::Recognized(ref text) => {
                sink.notice(NoticeLevel::Success, outcome.notice());
                if let Err(e) = orchestrator
                    .submit_transcript(&mut session, text, &mut sink)
                    .await
                {
                    sink.error(chat_failure(e));
                }
            }
            SpeechOutcome::NotUnderstood | SpeechOutcome::ServiceUnavailable(_) => {
                sink.notice(NoticeLevel::Error, outcome.notice());
            }
        }
    });

    Ok(sse)
}

fn chat_failure(err: colloquy_chat::ChatError) -> ErrorBody {
    ErrorBody {
        error: "chat_failed".to_string(),
        message: err.to_string(),
    }
}

// =============================================================================
// Image description
// =============================================================================

/// POST /api/analyze-image - multipart field `image`.
pub async fn analyze_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DescriptionResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("image") {
            upload = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }

    let bytes = upload.ok_or_else(|| ApiError::BadRequest("missing 'image' field".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("'image' must not be empty".to_string()));
    }

    tracing::info!(upload_bytes = bytes.len(), "Analyzing uploaded image");
    let description = state.vision.describe(&bytes).await?;
    Ok(Json(DescriptionResponse { description }))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
