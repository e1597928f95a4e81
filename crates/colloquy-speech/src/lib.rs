//! Colloquy speech crate - microphone capture and speech-to-text.
//!
//! Provides trait-based abstractions for capturing one utterance and for
//! recognizing it, a cpal microphone source (`microphone` feature) with a
//! recorder-process fallback, a Google Speech REST recognizer, and [`VoiceInput`], which maps the two steps onto the three
//! outcomes the page shows. Mock implementations allow testing without a
//! microphone or network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use colloquy_core::config::{CaptureBackend, SpeechConfig};

pub mod capture;
pub mod endpoint;
pub mod error;
pub mod google;
#[cfg(feature = "microphone")]
pub mod microphone;
pub mod voice;

pub use capture::CommandAudioSource;
pub use error::SpeechError;
pub use google::GoogleSpeechRecognizer;
#[cfg(feature = "microphone")]
pub use microphone::MicrophoneAudioSource;
pub use voice::{SpeechOutcome, VoiceInput, LISTENING_NOTICE};

// =============================================================================
// Audio
// =============================================================================

/// One captured utterance as signed 16-bit mono PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode little-endian PCM bytes. A trailing odd byte is dropped.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A microphone-like source that records a single utterance per call.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Block until one utterance has been captured.
    async fn capture_utterance(&self) -> Result<AudioClip, SpeechError>;
}

/// Build the audio source the config asks for.
///
/// Without the `microphone` feature, a microphone request falls back to the
/// recorder process.
pub fn source_from_config(config: &SpeechConfig) -> Arc<dyn AudioSource> {
    match config.capture {
        #[cfg(feature = "microphone")]
        CaptureBackend::Microphone => Arc::new(MicrophoneAudioSource::from_config(config)),
        #[cfg(not(feature = "microphone"))]
        CaptureBackend::Microphone => {
            tracing::warn!(
                recorder = %config.recorder_program,
                "Built without microphone support, using the recorder process"
            );
            Arc::new(CommandAudioSource::from_config(config))
        }
        CaptureBackend::Command => Arc::new(CommandAudioSource::from_config(config)),
    }
}

/// What a recognizer made of a clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Text(String),
    Unintelligible,
}

/// Remote speech-to-text service.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe a clip. Service failures are `SpeechError::Service`.
    async fn recognize(&self, clip: &AudioClip) -> Result<Recognition, SpeechError>;

    /// Service name for logging.
    fn name(&self) -> &str;
}

// =============================================================================
// Mock implementations
// =============================================================================

/// Audio source that hands out queued results, then one second of silence.
#[derive(Debug, Default)]
pub struct MockAudioSource {
    queue: Mutex<VecDeque<Result<AudioClip, SpeechError>>>,
}

impl MockAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(self, result: Result<AudioClip, SpeechError>) -> Self {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(result);
        }
        self
    }
}

#[async_trait]
impl AudioSource for MockAudioSource {
    async fn capture_utterance(&self) -> Result<AudioClip, SpeechError> {
        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| Ok(AudioClip::new(vec![0; 16_000], 16_000)))
    }
}

/// Recognizer that always gives the same answer.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    result: Result<Recognition, String>,
}

impl MockRecognizer {
    pub fn recognizing(text: impl Into<String>) -> Self {
        Self {
            result: Ok(Recognition::Text(text.into())),
        }
    }

    pub fn unintelligible() -> Self {
        Self {
            result: Ok(Recognition::Unintelligible),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            result: Err(detail.into()),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn recognize(&self, clip: &AudioClip) -> Result<Recognition, SpeechError> {
        tracing::debug!(duration_secs = clip.duration_secs(), "Mock recognition");
        self.result.clone().map_err(SpeechError::Service)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn recorder_config(capture: CaptureBackend) -> SpeechConfig {
        SpeechConfig {
            capture,
            recorder_program: "sh".to_string(),
            recorder_args: vec!["-c".to_string(), r"printf '\003\000'".to_string()],
            ..SpeechConfig::default()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_source_from_config_command_backend() {
        let source = source_from_config(&recorder_config(CaptureBackend::Command));
        let clip = source.capture_utterance().await.unwrap();
        assert_eq!(clip.samples, vec![3]);
        assert_eq!(clip.sample_rate, 16_000);
    }

    #[cfg(all(unix, not(feature = "microphone")))]
    #[tokio::test]
    async fn test_microphone_falls_back_to_recorder_without_feature() {
        let source = source_from_config(&recorder_config(CaptureBackend::Microphone));
        assert_eq!(source.capture_utterance().await.unwrap().samples, vec![3]);
    }

    #[test]
    fn test_clip_from_le_bytes() {
        let clip = AudioClip::from_le_bytes(&[0x01, 0x00, 0xff, 0xff, 0x00, 0x80], 16_000);
        assert_eq!(clip.samples, vec![1, -1, i16::MIN]);
        assert_eq!(clip.to_le_bytes(), vec![0x01, 0x00, 0xff, 0xff, 0x00, 0x80]);
    }

    #[test]
    fn test_clip_drops_trailing_odd_byte() {
        let clip = AudioClip::from_le_bytes(&[0x02, 0x00, 0x07], 8_000);
        assert_eq!(clip.samples, vec![2]);
    }

    #[test]
    fn test_clip_duration() {
        let clip = AudioClip::new(vec![0; 8_000], 16_000);
        assert!((clip.duration_secs() - 0.5).abs() < f32::EPSILON);
        assert_eq!(AudioClip::new(vec![0; 10], 0).duration_secs(), 0.0);
        assert!(AudioClip::new(vec![], 16_000).is_empty());
    }

    #[tokio::test]
    async fn test_mock_source_drains_queue_then_defaults() {
        let source = MockAudioSource::new()
            .with_result(Err(SpeechError::Capture("unplugged".to_string())))
            .with_result(Ok(AudioClip::new(vec![5], 16_000)));

        assert!(matches!(
            source.capture_utterance().await,
            Err(SpeechError::Capture(_))
        ));
        assert_eq!(source.capture_utterance().await.unwrap().samples, vec![5]);
        assert_eq!(source.capture_utterance().await.unwrap().samples.len(), 16_000);
    }

    #[tokio::test]
    async fn test_mock_recognizer_variants() {
        let clip = AudioClip::new(vec![0; 100], 16_000);
        assert_eq!(
            MockRecognizer::recognizing("hello").recognize(&clip).await.unwrap(),
            Recognition::Text("hello".to_string())
        );
        assert_eq!(
            MockRecognizer::unintelligible().recognize(&clip).await.unwrap(),
            Recognition::Unintelligible
        );
        assert!(matches!(
            MockRecognizer::unavailable("down").recognize(&clip).await,
            Err(SpeechError::Service(d)) if d == "down"
        ));
    }
}
