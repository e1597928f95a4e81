//! Speech input path: capture one utterance, recognize it, report an outcome.

use std::fmt;
use std::sync::Arc;

use crate::error::SpeechError;
use crate::{AudioSource, Recognition, SpeechRecognizer};

/// Shown while waiting for the user to speak.
pub const LISTENING_NOTICE: &str = "Listening...";

const NOT_UNDERSTOOD_NOTICE: &str = "Sorry, I did not understand that.";

/// Result of one speech action. Only `Recognized` produces a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    Recognized(String),
    NotUnderstood,
    ServiceUnavailable(String),
}

impl SpeechOutcome {
    /// Text shown to the user for this outcome.
    pub fn notice(&self) -> String {
        match self {
            SpeechOutcome::Recognized(text) => format!("You said: {}", text),
            SpeechOutcome::NotUnderstood => NOT_UNDERSTOOD_NOTICE.to_string(),
            SpeechOutcome::ServiceUnavailable(detail) => format!(
                "Could not request results from the speech recognition service; {}",
                detail
            ),
        }
    }

    pub fn transcript(&self) -> Option<&str> {
        match self {
            SpeechOutcome::Recognized(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for SpeechOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.notice())
    }
}

/// Couples an audio source with a recognizer.
#[derive(Clone)]
pub struct VoiceInput {
    source: Arc<dyn AudioSource>,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl VoiceInput {
    pub fn new(source: Arc<dyn AudioSource>, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self { source, recognizer }
    }

    /// Capture and recognize one utterance.
    ///
    /// A capture timeout counts as not understood. Other capture failures
    /// (recorder missing, device error) are returned as errors.
    pub async fn listen(&self) -> Result<SpeechOutcome, SpeechError> {
        let clip = match self.source.capture_utterance().await {
            Ok(clip) => clip,
            Err(SpeechError::Timeout(secs)) => {
                tracing::info!(timeout_secs = secs, "No utterance before timeout");
                return Ok(SpeechOutcome::NotUnderstood);
            }
            Err(e) => return Err(e),
        };

        if clip.is_empty() {
            tracing::info!("Captured clip is empty");
            return Ok(SpeechOutcome::NotUnderstood);
        }

        let outcome = match self.recognizer.recognize(&clip).await {
            Ok(Recognition::Text(text)) => SpeechOutcome::Recognized(text),
            Ok(Recognition::Unintelligible) => SpeechOutcome::NotUnderstood,
            Err(SpeechError::Service(detail)) => {
                tracing::warn!(
                    recognizer = self.recognizer.name(),
                    %detail,
                    "Speech service unavailable"
                );
                SpeechOutcome::ServiceUnavailable(detail)
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            recognizer = self.recognizer.name(),
            duration_secs = clip.duration_secs(),
            recognized = outcome.transcript().is_some(),
            "Speech input handled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioClip, MockAudioSource, MockRecognizer};

    fn voice(source: MockAudioSource, recognizer: MockRecognizer) -> VoiceInput {
        VoiceInput::new(Arc::new(source), Arc::new(recognizer))
    }

    #[test]
    fn test_notices() {
        assert_eq!(
            SpeechOutcome::Recognized("hi".to_string()).notice(),
            "You said: hi"
        );
        assert_eq!(
            SpeechOutcome::NotUnderstood.notice(),
            "Sorry, I did not understand that."
        );
        assert_eq!(
            SpeechOutcome::ServiceUnavailable("quota exceeded".to_string()).to_string(),
            "Could not request results from the speech recognition service; quota exceeded"
        );
        assert_eq!(LISTENING_NOTICE, "Listening...");
    }

    #[tokio::test]
    async fn test_recognized() {
        let v = voice(MockAudioSource::new(), MockRecognizer::recognizing("hello"));
        let outcome = v.listen().await.unwrap();
        assert_eq!(outcome, SpeechOutcome::Recognized("hello".to_string()));
        assert_eq!(outcome.transcript(), Some("hello"));
    }

    #[tokio::test]
    async fn test_unintelligible() {
        let v = voice(MockAudioSource::new(), MockRecognizer::unintelligible());
        let outcome = v.listen().await.unwrap();
        assert_eq!(outcome, SpeechOutcome::NotUnderstood);
        assert_eq!(outcome.transcript(), None);
    }

    #[tokio::test]
    async fn test_service_unavailable() {
        let v = voice(MockAudioSource::new(), MockRecognizer::unavailable("offline"));
        assert_eq!(
            v.listen().await.unwrap(),
            SpeechOutcome::ServiceUnavailable("offline".to_string())
        );
    }

    #[tokio::test]
    async fn test_timeout_is_not_understood() {
        let source = MockAudioSource::new().with_result(Err(SpeechError::Timeout(5)));
        let v = voice(source, MockRecognizer::recognizing("never"));
        assert_eq!(v.listen().await.unwrap(), SpeechOutcome::NotUnderstood);
    }

    #[tokio::test]
    async fn test_empty_clip_is_not_understood() {
        let source = MockAudioSource::new().with_result(Ok(AudioClip::new(vec![], 16_000)));
        let v = voice(source, MockRecognizer::recognizing("never"));
        assert_eq!(v.listen().await.unwrap(), SpeechOutcome::NotUnderstood);
    }

    #[tokio::test]
    async fn test_capture_failure_is_error() {
        let source =
            MockAudioSource::new().with_result(Err(SpeechError::Capture("no device".to_string())));
        let v = voice(source, MockRecognizer::recognizing("never"));
        assert!(matches!(v.listen().await, Err(SpeechError::Capture(_))));
    }
}
