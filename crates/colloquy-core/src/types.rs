use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Who produced a turn in the session history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// Typed input from the user.
    #[serde(rename = "user")]
    User,
    /// Input captured from the microphone and transcribed.
    #[serde(rename = "user-via-speech")]
    UserViaSpeech,
    /// A chunk of the model's streamed answer.
    #[serde(rename = "bot")]
    Bot,
}

impl Speaker {
    /// Wire label used in JSON and SSE payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::UserViaSpeech => "user-via-speech",
            Speaker::Bot => "bot",
        }
    }

    /// Label shown next to the turn in the history view.
    pub fn display_label(&self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::UserViaSpeech => "You (via speech)",
            Speaker::Bot => "Bot",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Turn
// =============================================================================

/// One recorded unit of a conversation: a speaker and their text.
///
/// Fields are private so a turn cannot be edited after it has been created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    speaker: Speaker,
    text: String,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    pub fn user_via_speech(text: impl Into<String>) -> Self {
        Self::new(Speaker::UserViaSpeech, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Speaker::Bot, text)
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

// =============================================================================
// SessionHistory
// =============================================================================

/// Ordered, append-only log of turns for one session.
///
/// The only way to remove turns is [`SessionHistory::clear`], which drops all
/// of them at once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHistory {
    turns: Vec<Turn>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end of the log.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Reset the log to empty. Calling it on an empty history is a no-op.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl<'a> IntoIterator for &'a SessionHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
