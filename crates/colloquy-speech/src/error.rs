//! Error types for speech input.

use colloquy_core::error::ColloquyError;

/// Errors from audio capture and speech recognition.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech input is disabled")]
    Disabled,
    #[error("audio capture failed: {0}")]
    Capture(String),
    #[error("no utterance captured within {0} seconds")]
    Timeout(u64),
    #[error("{0}")]
    Service(String),
}

impl From<SpeechError> for ColloquyError {
    fn from(err: SpeechError) -> Self {
        ColloquyError::Speech(err.to_string())
    }
}
