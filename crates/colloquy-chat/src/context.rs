//! Conversation context and per-session state.
//!
//! A [`ChatSession`] owns the visible [`SessionHistory`] and the
//! [`ConversationContext`] sent to the model with every call. Sessions are
//! created and aged by [`SessionManager`].

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use colloquy_core::types::SessionHistory;

// =============================================================================
// ConversationContext
// =============================================================================

/// Author of a context message, as the chat service names it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One prior message sent back to the model as context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub text: String,
}

/// Prior exchanges the model sees on each call.
///
/// Only completed exchanges are recorded: a call that fails part-way leaves
/// the context as it was before the call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationContext {
    messages: Vec<ContextMessage>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ContextMessage] {
        &self.messages
    }

    /// Record a finished exchange: the user's query followed by the full reply.
    pub fn record_exchange(&mut self, query: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(ContextMessage {
            role: Role::User,
            text: query.into(),
        });
        self.messages.push(ContextMessage {
            role: Role::Model,
            text: reply.into(),
        });
    }

    /// Forget all prior exchanges.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// =============================================================================
// ChatSession
// =============================================================================

/// State owned by one interactive session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    /// Epoch seconds when the session was created.
    pub started_at: i64,
    /// Epoch seconds of the most recent action.
    pub last_action_at: i64,
    /// Turns rendered in the history view.
    pub history: SessionHistory,
    /// Messages replayed to the model.
    pub context: ConversationContext,
    /// Number of actions handled.
    pub action_count: u64,
}

// =============================================================================
// SessionManager
// =============================================================================

/// Creates sessions and decides when idle ones expire.
pub struct SessionManager {
    /// Session timeout in minutes.
    pub session_timeout_minutes: u32,
}

impl SessionManager {
    pub fn new(session_timeout_minutes: u32) -> Self {
        Self {
            session_timeout_minutes,
        }
    }

    /// Create a fresh session with empty history and context.
    pub fn create_session(&self) -> ChatSession {
        let now = Local::now().timestamp();
        ChatSession {
            id: Uuid::new_v4(),
            started_at: now,
            last_action_at: now,
            history: SessionHistory::new(),
            context: ConversationContext::new(),
            action_count: 0,
        }
    }

    /// Check whether a session has been idle longer than the timeout.
    pub fn is_expired(&self, session: &ChatSession) -> bool {
        let now = Local::now().timestamp();
        let timeout_secs = i64::from(self.session_timeout_minutes) * 60;
        now - session.last_action_at > timeout_secs
    }

    /// Mark the start of a new action on the session.
    pub fn touch(&self, session: &mut ChatSession) {
        session.last_action_at = Local::now().timestamp();
        session.action_count += 1;
    }

    /// Mark the end of an action. Idle time counts from here, so a long
    /// action does not leave the session already expired.
    pub fn settle(&self, session: &mut ChatSession) {
        session.last_action_at = Local::now().timestamp();
    }
}

// =============================================================================
// Tests
// =============================================================================
