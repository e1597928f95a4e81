//! Colloquy vision crate - image description adapter.
//!
//! Re-encodes an uploaded image as JPEG, posts it to a captioning endpoint
//! and returns the description text. HTTP-level failures become fixed
//! user-facing strings; only transport and decode problems are errors.

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use colloquy_core::config::VisionConfig;
use colloquy_core::error::ColloquyError;

/// Returned when the endpoint answers 200 without a description.
pub const NO_DESCRIPTION: &str = "No description available.";

/// Returned when the endpoint answers with anything but a usable 200.
pub const ANALYSIS_FAILED: &str = "Failed to analyze image.";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("unsupported or corrupt image: {0}")]
    Decode(String),
    #[error("image encoding failed: {0}")]
    Encode(String),
    #[error("image analysis request failed: {0}")]
    Request(String),
}

impl From<VisionError> for ColloquyError {
    fn from(err: VisionError) -> Self {
        ColloquyError::Vision(err.to_string())
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Something that turns image bytes into a caption.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe an uploaded image (any format the decoder understands).
    async fn describe(&self, image: &[u8]) -> Result<String, VisionError>;
}

// =============================================================================
// Helpers
// =============================================================================

/// Decode `bytes`, drop any alpha channel and re-encode as baseline JPEG.
pub fn encode_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, VisionError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| VisionError::Decode(e.to_string()))?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| VisionError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Map the endpoint's answer to the text shown to the user.
pub fn interpret_response(status: u16, body: &str) -> String {
    if status != 200 {
        tracing::warn!(status, body, "Image analysis failed");
        return ANALYSIS_FAILED.to_string();
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => {
            tracing::debug!(response = %json, "Image analysis response");
            json.get("description")
                .and_then(|d| d.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string())
        }
        Err(e) => {
            tracing::warn!(status, body, error = %e, "Image analysis returned non-JSON body");
            ANALYSIS_FAILED.to_string()
        }
    }
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// Posts JPEG uploads to a captioning endpoint as multipart field `image`.
#[derive(Debug, Clone)]
pub struct ImageAnalyzer {
    client: Client,
    endpoint: String,
    jpeg_quality: u8,
}

impl ImageAnalyzer {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageDescriber for ImageAnalyzer {
    async fn describe(&self, image: &[u8]) -> Result<String, VisionError> {
        let upload = image.to_vec();
        let quality = self.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&upload, quality))
            .await
            .map_err(|e| VisionError::Encode(e.to_string()))??;

        tracing::debug!(
            endpoint = %self.endpoint,
            upload_bytes = image.len(),
            jpeg_bytes = jpeg.len(),
            "Sending image for analysis"
        );

        let part = Part::bytes(jpeg)
            .file_name("image")
            .mime_str("image/jpeg")
            .map_err(|e| VisionError::Request(e.to_string()))?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VisionError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| VisionError::Request(e.to_string()))?;

        Ok(interpret_response(status, &body))
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Describer that returns a fixed caption, for tests and offline runs.
#[derive(Debug, Clone)]
pub struct MockImageDescriber {
    description: String,
}

impl MockImageDescriber {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

#[async_trait]
impl ImageDescriber for MockImageDescriber {
    async fn describe(&self, image: &[u8]) -> Result<String, VisionError> {
        if image.is_empty() {
            return Err(VisionError::Decode("empty upload".to_string()));
        }
        Ok(self.description.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
