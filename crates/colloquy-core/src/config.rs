use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ColloquyError, Result};

/// Top-level configuration for Colloquy.
///
/// Loaded from `~/.colloquy/config.toml` by default. Every field has a
/// default, so a missing file or a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColloquyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}

impl ColloquyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ColloquyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ColloquyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// HTTP port for the web page and API.
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Title shown at the top of the page.
    pub page_title: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            port: 8501,
            log_level: "info".to_string(),
            page_title: "Personalized Chat Bot".to_string(),
        }
    }
}

/// Language-model chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model identifier passed to the generative-language API.
    pub model: String,
    /// Base URL of the generative-language API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Longest accepted query, in characters.
    pub max_query_chars: usize,
    /// Idle minutes after which a session is discarded.
    pub session_timeout_minutes: u32,
    /// Whether "clear history" also forgets the model-side conversation context.
    pub clear_resets_context: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gemini-pro".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            max_query_chars: 8000,
            session_timeout_minutes: 120,
            clear_resets_context: false,
        }
    }
}

/// Placeholder in `recorder_args` replaced by `sample_rate`.
pub const SAMPLE_RATE_PLACEHOLDER: &str = "{sample_rate}";

/// Where utterances are captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// Default input device, read directly.
    Microphone,
    /// External recorder process writing PCM to stdout.
    Command,
}

/// Speech input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether the "speak" action is offered.
    pub enabled: bool,
    /// Base URL of the speech-to-text API.
    pub api_base: String,
    /// BCP-47 language code sent to the recognizer.
    pub language: String,
    /// Sample rate of the audio sent to the recognizer, in Hz.
    pub sample_rate: u32,
    pub capture: CaptureBackend,
    /// Input device name (substring match), or "default".
    pub input_device: String,
    /// RMS level (0.0-1.0) above which input counts as speech.
    pub energy_threshold: f32,
    /// Seconds of quiet that end an utterance.
    pub pause_secs: f32,
    /// Longest utterance kept, in seconds.
    pub phrase_limit_secs: u32,
    /// Recorder program. Must write raw signed 16-bit little-endian mono PCM
    /// to stdout and exit once the utterance ends.
    pub recorder_program: String,
    /// Arguments passed to the recorder program. `{sample_rate}` is replaced
    /// with `sample_rate`.
    pub recorder_args: Vec<String>,
    /// Give up waiting for an utterance after this many seconds.
    /// Absent means wait indefinitely.
    pub capture_timeout_secs: Option<u64>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://speech.googleapis.com/v1".to_string(),
            language: "en-US".to_string(),
            sample_rate: 16_000,
            capture: CaptureBackend::Microphone,
            input_device: "default".to_string(),
            energy_threshold: 0.01,
            pause_secs: 0.8,
            phrase_limit_secs: 30,
            recorder_program: "rec".to_string(),
            recorder_args: [
                "-q", "-t", "raw", "-r", SAMPLE_RATE_PLACEHOLDER, "-e", "signed", "-b", "16", "-c", "1", "-",
                "silence", "1", "0.1", "1%", "1", "1.5", "1%",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            capture_timeout_secs: None,
        }
    }
}

/// Image description settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Captioning endpoint that receives the JPEG upload.
    pub endpoint: String,
    /// JPEG quality (1-100) used when re-encoding uploads.
    pub jpeg_quality: u8,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://example.com/api/analyze_image".to_string(),
            jpeg_quality: 75,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ColloquyConfig::default();
        assert_eq!(config.general.port, 8501);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.chat.model, "gemini-pro");
        assert_eq!(config.chat.api_key_env, "GOOGLE_API_KEY");
        assert!(!config.chat.clear_resets_context);
        assert!(config.speech.enabled);
        assert_eq!(config.speech.sample_rate, 16_000);
        assert!(config.speech.capture_timeout_secs.is_none());
        assert_eq!(config.vision.endpoint, "https://example.com/api/analyze_image");
        assert_eq!(config.vision.jpeg_quality, 75);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
port = 9000
log_level = "debug"

[chat]
model = "gemini-1.5-flash"
clear_resets_context = true

[speech]
language = "de-DE"
capture_timeout_secs = 15
recorder_program = "arecord"
recorder_args = ["-q", "-f", "S16_LE"]

[vision]
endpoint = "http://127.0.0.1:9999/caption"
"#;
        let file = create_temp_config(content);
        let config = ColloquyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.port, 9000);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.chat.model, "gemini-1.5-flash");
        assert!(config.chat.clear_resets_context);
        assert_eq!(config.speech.language, "de-DE");
        assert_eq!(config.speech.capture_timeout_secs, Some(15));
        assert_eq!(config.speech.recorder_program, "arecord");
        assert_eq!(config.speech.recorder_args, vec!["-q", "-f", "S16_LE"]);
        assert_eq!(config.vision.endpoint, "http://127.0.0.1:9999/caption");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = ColloquyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 8501);
        assert_eq!(config.chat.model, "gemini-pro");
        assert_eq!(config.vision.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ColloquyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.page_title, "Personalized Chat Bot");
        assert_eq!(config.chat.session_timeout_minutes, 120);
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[general\nport = ");
        let err = ColloquyConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ColloquyError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ColloquyConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.port, 8501);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ColloquyConfig::default();
        config.speech.capture_timeout_secs = Some(30);
        config.chat.model = "gemini-1.5-pro".to_string();
        config.save(&path).unwrap();

        let reloaded = ColloquyConfig::load(&path).unwrap();
        assert_eq!(reloaded.chat.model, "gemini-1.5-pro");
        assert_eq!(reloaded.speech.capture_timeout_secs, Some(30));
        assert_eq!(reloaded.speech.recorder_args, config.speech.recorder_args);
    }

    #[test]
    fn test_default_recorder_writes_raw_pcm_to_stdout() {
        let speech = SpeechConfig::default();
        assert_eq!(speech.recorder_program, "rec");
        assert!(speech.recorder_args.iter().any(|a| a == "raw"));
        assert!(speech.recorder_args.iter().any(|a| a == "-"));
        assert!(speech.recorder_args.iter().any(|a| a == "silence"));
        assert!(speech.recorder_args.iter().any(|a| a == SAMPLE_RATE_PLACEHOLDER));
        assert!(!speech.recorder_args.iter().any(|a| a == "16000"));
    }

    #[test]
    fn test_capture_backend_parses_lowercase() {
        let config: ColloquyConfig = toml::from_str("[speech]\ncapture = \"command\"\n").unwrap();
        assert_eq!(config.speech.capture, CaptureBackend::Command);
        assert_eq!(SpeechConfig::default().capture, CaptureBackend::Microphone);
        assert_eq!(SpeechConfig::default().input_device, "default");
    }
}
