//! Google Cloud Speech-to-Text (v1 REST) recognizer.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use colloquy_core::config::SpeechConfig;
use colloquy_core::credentials::ApiCredential;

use crate::error::SpeechError;
use crate::{AudioClip, Recognition, SpeechRecognizer};

#[derive(Clone)]
pub struct GoogleSpeechRecognizer {
    client: Client,
    api_key: String,
    api_base: String,
    language: String,
}

impl GoogleSpeechRecognizer {
    pub fn new(credential: &ApiCredential, config: &SpeechConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: credential.key().to_string(),
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            language: config.language.clone(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Pick the top transcript of the first result.
fn interpret(response: RecognizeResponse) -> Recognition {
    let transcript = response
        .results
        .into_iter()
        .next()
        .and_then(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript.trim().to_string())
        .unwrap_or_default();

    if transcript.is_empty() {
        Recognition::Unintelligible
    } else {
        Recognition::Text(transcript)
    }
}

#[async_trait]
impl SpeechRecognizer for GoogleSpeechRecognizer {
    async fn recognize(&self, clip: &AudioClip) -> Result<Recognition, SpeechError> {
        let body = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: clip.sample_rate,
                language_code: &self.language,
            },
            audio: RecognitionAudio {
                content: BASE64.encode(clip.to_le_bytes()),
            },
        };

        let response = self
            .client
            .post(format!("{}/speech:recognize", self.api_base))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Service(format!("recognition connection failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SpeechError::Service(format!("recognition connection failed: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| text.trim().to_string());
            tracing::warn!(status = status.as_u16(), %message, "Speech recognition rejected");
            return Err(SpeechError::Service(format!(
                "recognition request failed: {} {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: RecognizeResponse = serde_json::from_str(&text)
            .map_err(|e| SpeechError::Service(format!("malformed recognition response: {}", e)))?;
        let recognition = interpret(parsed);
        tracing::debug!(
            recognized = matches!(recognition, Recognition::Text(_)),
            "Speech recognition finished"
        );
        Ok(recognition)
    }

    fn name(&self) -> &str {
        "google-speech"
    }
}

// =============================================================================
// Tests
// =============================================================================
