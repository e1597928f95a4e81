//! Audio source reading the input device directly through cpal.
//!
//! Capture runs on a blocking thread that owns the cpal stream for the
//! whole utterance; the stream is dropped, stopping capture, before the
//! clip is returned.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};

use colloquy_core::config::SpeechConfig;

use crate::endpoint::{downmix, resample, to_pcm16, UtteranceDetector};
use crate::error::SpeechError;
use crate::{AudioClip, AudioSource};

/// How often the capture thread checks the deadline while no audio arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct MicrophoneAudioSource {
    config: SpeechConfig,
    timeout: Option<Duration>,
}

impl MicrophoneAudioSource {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            config: config.clone(),
            timeout: config.capture_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.config.input_device
    }
}

#[async_trait]
impl AudioSource for MicrophoneAudioSource {
    async fn capture_utterance(&self) -> Result<AudioClip, SpeechError> {
        let config = self.config.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || capture_blocking(&config, timeout))
            .await
            .map_err(|e| SpeechError::Capture(format!("capture thread failed: {}", e)))?
    }
}

fn select_device(host: &cpal::Host, name: &str) -> Result<cpal::Device, SpeechError> {
    if name == "default" {
        return host
            .default_input_device()
            .ok_or_else(|| SpeechError::Capture("no default input device found".into()));
    }
    let name_lower = name.to_lowercase();
    host.input_devices()
        .map_err(|e| SpeechError::Capture(format!("failed to enumerate devices: {}", e)))?
        .find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&name_lower))
                .unwrap_or(false)
        })
        .ok_or_else(|| SpeechError::Capture(format!("audio device '{}' not found", name)))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let frame: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
            // The receiver is gone once the utterance is complete.
            let _ = tx.send(frame);
        },
        |err| tracing::error!("Audio stream error: {}", err),
        None,
    )
}

fn capture_blocking(
    config: &SpeechConfig,
    timeout: Option<Duration>,
) -> Result<AudioClip, SpeechError> {
    let host = cpal::default_host();
    let device = select_device(&host, &config.input_device)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device
        .default_input_config()
        .map_err(|e| SpeechError::Capture(format!("no usable input config: {}", e)))?;
    let device_rate = supported.sample_rate().0;
    let device_channels = supported.channels();
    let stream_config: cpal::StreamConfig = supported.config();

    let (tx, rx) = mpsc::channel::<Vec<f32>>();
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, tx),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, tx),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, tx),
        other => {
            return Err(SpeechError::Capture(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| SpeechError::Capture(format!("failed to build audio stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| SpeechError::Capture(format!("failed to start audio stream: {}", e)))?;
    tracing::info!(
        device = %device_name,
        device_rate,
        device_channels,
        target_rate = config.sample_rate,
        "Microphone capture started"
    );

    let mut detector = UtteranceDetector::from_config(config, device_rate);
    let deadline = timeout.map(|t| (Instant::now() + t, t));
    loop {
        if let Some((at, limit)) = deadline {
            if Instant::now() >= at {
                return Err(SpeechError::Timeout(limit.as_secs()));
            }
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => {
                if detector.push(&downmix(&frame, device_channels)) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(SpeechError::Capture("audio stream closed".into()));
            }
        }
    }
    drop(stream);

    let mono = resample(&detector.into_samples(), device_rate, config.sample_rate);
    let clip = AudioClip::new(to_pcm16(&mono), config.sample_rate);
    tracing::debug!(
        samples = clip.samples.len(),
        duration_secs = clip.duration_secs(),
        "Utterance captured"
    );
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_carries_device_and_timeout() {
        let config = SpeechConfig {
            input_device: "USB".to_string(),
            capture_timeout_secs: Some(4),
            ..SpeechConfig::default()
        };
        let source = MicrophoneAudioSource::from_config(&config);
        assert_eq!(source.device_name(), "USB");
        assert_eq!(source.timeout, Some(Duration::from_secs(4)));
    }
}
