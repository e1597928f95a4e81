//! Chat orchestrator: owns the session registry and runs user actions.
//!
//! Each session sits behind its own async mutex. Callers hold that lock for
//! the whole action (ask, speak, clear) so actions on one session never
//! interleave, while different sessions proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use colloquy_core::config::ChatConfig;
use colloquy_core::types::{SessionHistory, Turn};

use crate::aggregator::{AggregatedResponse, ResponseAggregator, ResponseSink};
use crate::context::{ChatSession, SessionManager};
use crate::error::ChatError;
use crate::service::ChatService;

/// A session shared between the registry and the action currently using it.
pub type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

/// Summary of a session for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSessionSummary {
    pub id: Uuid,
    pub started_at: String,
    /// `None` while an action holds the session.
    pub last_action_at: Option<String>,
    /// `None` while an action holds the session.
    pub turn_count: Option<usize>,
    pub busy: bool,
}

struct SessionEntry {
    started_at: i64,
    session: SharedSession,
}

/// Central coordinator between the HTTP layer and the response aggregator.
pub struct ChatOrchestrator {
    aggregator: ResponseAggregator,
    session_manager: SessionManager,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(config: ChatConfig, service: Arc<dyn ChatService>) -> Self {
        Self {
            aggregator: ResponseAggregator::new(service),
            session_manager: SessionManager::new(config.session_timeout_minutes),
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Register a fresh session and return its id.
    pub fn create_session(&self) -> Result<Uuid, ChatError> {
        let session = self.session_manager.create_session();
        let id = session.id;
        let entry = SessionEntry {
            started_at: session.started_at,
            session: Arc::new(tokio::sync::Mutex::new(session)),
        };
        self.lock_sessions()?.insert(id, entry);
        tracing::info!(session_id = %id, "Session created");
        Ok(id)
    }

    /// Look up a live session. Idle sessions past the timeout are dropped.
    pub fn session(&self, id: Uuid) -> Result<SharedSession, ChatError> {
        let mut sessions = self.lock_sessions()?;
        let shared = match sessions.get(&id) {
            Some(entry) => Arc::clone(&entry.session),
            None => return Err(ChatError::SessionNotFound(id)),
        };

        // A session that is busy is in use, so it cannot be idle.
        let expired = shared
            .try_lock()
            .map(|s| self.session_manager.is_expired(&s))
            .unwrap_or(false);
        if expired {
            sessions.remove(&id);
            tracing::info!(session_id = %id, "Session expired");
            return Err(ChatError::SessionNotFound(id));
        }

        Ok(shared)
    }

    /// Reject empty or oversized queries.
    pub fn validate_query(&self, query: &str) -> Result<(), ChatError> {
        if query.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        if query.chars().count() > self.config.max_query_chars {
            return Err(ChatError::QueryTooLong(self.config.max_query_chars));
        }
        Ok(())
    }

    /// Handle a typed query.
    pub async fn submit_text(
        &self,
        session: &mut ChatSession,
        query: &str,
        sink: &mut dyn ResponseSink,
    ) -> Result<AggregatedResponse, ChatError> {
        self.validate_query(query)?;
        self.session_manager.touch(session);
        tracing::info!(
            session_id = %session.id,
            query_chars = query.chars().count(),
            "Submitting typed query"
        );
        self.run(session, query, sink).await
    }

    /// Handle recognized speech: record the transcript as a speech turn,
    /// then submit it like a typed query.
    pub async fn submit_transcript(
        &self,
        session: &mut ChatSession,
        transcript: &str,
        sink: &mut dyn ResponseSink,
    ) -> Result<AggregatedResponse, ChatError> {
        self.validate_query(transcript)?;
        self.session_manager.touch(session);
        let speech_turn = Turn::user_via_speech(transcript);
        session.history.push(speech_turn.clone());
        sink.on_turn(&speech_turn);
        tracing::info!(
            session_id = %session.id,
            query_chars = transcript.chars().count(),
            "Submitting spoken query"
        );
        self.run(session, transcript, sink).await
    }

    /// Empty the session's history. Always succeeds.
    pub fn clear_history(&self, session: &mut ChatSession) {
        self.session_manager.touch(session);
        session.history.clear();
        if self.config.clear_resets_context {
            session.context.reset();
        }
        tracing::info!(
            session_id = %session.id,
            context_reset = self.config.clear_resets_context,
            "History cleared"
        );
    }

    /// Restart the idle clock once an action is over, whatever its outcome.
    pub fn finish_action(&self, session: &mut ChatSession) {
        self.session_manager.settle(session);
    }

    /// Snapshot of a session's history, waiting for any running action.
    pub async fn history(&self, id: Uuid) -> Result<SessionHistory, ChatError> {
        let shared = self.session(id)?;
        let session = shared.lock().await;
        Ok(session.history.clone())
    }

    pub fn list_sessions(&self) -> Result<Vec<ChatSessionSummary>, ChatError> {
        let sessions = self.lock_sessions()?;
        let mut summaries: Vec<(i64, ChatSessionSummary)> = sessions
            .iter()
            .map(|(id, entry)| {
                let summary = match entry.session.try_lock() {
                    Ok(s) => ChatSessionSummary {
                        id: *id,
                        started_at: format_epoch(entry.started_at),
                        last_action_at: Some(format_epoch(s.last_action_at)),
                        turn_count: Some(s.history.len()),
                        busy: false,
                    },
                    Err(_) => ChatSessionSummary {
                        id: *id,
                        started_at: format_epoch(entry.started_at),
                        last_action_at: None,
                        turn_count: None,
                        busy: true,
                    },
                };
                (entry.started_at, summary)
            })
            .collect();
        summaries.sort_by_key(|(started_at, _)| *started_at);
        Ok(summaries.into_iter().map(|(_, s)| s).collect())
    }

    pub fn delete_session(&self, id: Uuid) -> Result<(), ChatError> {
        if self.lock_sessions()?.remove(&id).is_some() {
            tracing::info!(session_id = %id, "Session deleted");
            Ok(())
        } else {
            Err(ChatError::SessionNotFound(id))
        }
    }

    /// Drop every idle session past the timeout. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, ChatError> {
        let mut sessions = self.lock_sessions()?;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry
                .session
                .try_lock()
                .map(|s| !self.session_manager.is_expired(&s))
                .unwrap_or(true)
        });
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, "Expired sessions purged");
        }
        Ok(removed)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    // -- Private helpers --

    async fn run(
        &self,
        session: &mut ChatSession,
        query: &str,
        sink: &mut dyn ResponseSink,
    ) -> Result<AggregatedResponse, ChatError> {
        let result = self.aggregator.submit(session, query, sink).await;
        self.finish_action(session);
        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    service = self.aggregator.service_name(),
                    error = %e,
                    "Chat request failed"
                );
                Err(e)
            }
        }
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, SessionEntry>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::Registry(format!("session lock poisoned: {}", e)))
    }
}

/// Format epoch seconds as ISO 8601 string.
fn format_epoch(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt: DateTime<Local>| dt.to_rfc3339())
        .unwrap_or_else(|| epoch.to_string())
}

// =============================================================================
// Tests
// =============================================================================
