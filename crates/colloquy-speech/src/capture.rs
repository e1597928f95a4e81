//! Audio source backed by an external recorder process.
//!
//! The recorder writes raw signed 16-bit little-endian mono PCM to stdout and
//! exits once the utterance is over (sox `rec` with a trailing `silence`
//! effect does this).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use colloquy_core::config::{SpeechConfig, SAMPLE_RATE_PLACEHOLDER};

use crate::error::SpeechError;
use crate::{AudioClip, AudioSource};

#[derive(Debug, Clone)]
pub struct CommandAudioSource {
    program: String,
    args: Vec<String>,
    sample_rate: u32,
    timeout: Option<Duration>,
}

impl CommandAudioSource {
    pub fn new(program: impl Into<String>, args: Vec<String>, sample_rate: u32) -> Self {
        Self {
            program: program.into(),
            args,
            sample_rate,
            timeout: None,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        let source = Self::new(
            config.recorder_program.clone(),
            expand_args(&config.recorder_args, config.sample_rate),
            config.sample_rate,
        );
        match config.capture_timeout_secs {
            Some(secs) => source.with_timeout(Duration::from_secs(secs)),
            None => source,
        }
    }

    /// Give up when no complete utterance arrives within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Substitute the configured sample rate so the recorder and the
/// recognizer agree on it.
fn expand_args(args: &[String], sample_rate: u32) -> Vec<String> {
    let rate = sample_rate.to_string();
    args.iter()
        .map(|a| a.replace(SAMPLE_RATE_PLACEHOLDER, &rate))
        .collect()
}

#[async_trait]
impl AudioSource for CommandAudioSource {
    async fn capture_utterance(&self) -> Result<AudioClip, SpeechError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Capture(format!("failed to start {}: {}", self.program, e)))?;

        tracing::debug!(program = %self.program, "Recorder started");

        // Dropping the future on timeout drops the child, which kills it.
        let recording = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, recording)
                .await
                .map_err(|_| SpeechError::Timeout(limit.as_secs()))?,
            None => recording.await,
        }
        .map_err(|e| SpeechError::Capture(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeechError::Capture(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let clip = AudioClip::from_le_bytes(&output.stdout, self.sample_rate);
        tracing::debug!(
            samples = clip.samples.len(),
            duration_secs = clip.duration_secs(),
            "Utterance captured"
        );
        Ok(clip)
    }
}
