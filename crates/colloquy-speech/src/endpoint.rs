//! Utterance endpointing and sample conversion for live capture.
//!
//! Device callbacks deliver interleaved `f32` frames at the device's own
//! rate. [`UtteranceDetector`] waits for input above the energy threshold,
//! keeps everything from there on, and completes after a run of quiet
//! input or at the phrase limit.

use colloquy_core::config::SpeechConfig;

/// Average interleaved channels down to mono.
pub fn downmix(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Resample mono audio by linear interpolation.
pub fn resample(mono: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || mono.is_empty() || to_rate == 0 {
        return mono.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (mono.len() as f64 / ratio).ceil() as usize;
    let last = mono.len() - 1;
    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx0 = (src.floor() as usize).min(last);
            let idx1 = (idx0 + 1).min(last);
            let frac = (src - idx0 as f64) as f32;
            mono[idx0] * (1.0 - frac) + mono[idx1] * frac
        })
        .collect()
}

/// Convert `[-1.0, 1.0]` samples to signed 16-bit PCM.
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

fn rms(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No speech heard yet.
    Waiting,
    Speaking,
    Complete,
}

/// Energy-based utterance detector over mono audio.
#[derive(Debug, Clone)]
pub struct UtteranceDetector {
    threshold: f32,
    pause_samples: usize,
    max_samples: usize,
    state: DetectorState,
    samples: Vec<f32>,
    quiet_run: usize,
}

impl UtteranceDetector {
    pub fn new(sample_rate: u32, threshold: f32, pause_secs: f32, phrase_limit_secs: u32) -> Self {
        Self {
            threshold,
            pause_samples: (pause_secs.max(0.0) * sample_rate as f32) as usize,
            max_samples: (phrase_limit_secs as usize).saturating_mul(sample_rate as usize),
            state: DetectorState::Waiting,
            samples: Vec::new(),
            quiet_run: 0,
        }
    }

    /// Detector for audio arriving at `sample_rate`, tuned from the config.
    pub fn from_config(config: &SpeechConfig, sample_rate: u32) -> Self {
        Self::new(
            sample_rate,
            config.energy_threshold,
            config.pause_secs,
            config.phrase_limit_secs,
        )
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Feed one chunk of mono audio. Returns true once the utterance is over.
    pub fn push(&mut self, chunk: &[f32]) -> bool {
        let loud = rms(chunk) >= self.threshold;
        match self.state {
            DetectorState::Complete => return true,
            DetectorState::Waiting if !loud => return false,
            DetectorState::Waiting => {
                self.state = DetectorState::Speaking;
                self.quiet_run = 0;
            }
            DetectorState::Speaking => {
                if loud {
                    self.quiet_run = 0;
                } else {
                    self.quiet_run += chunk.len();
                }
            }
        }

        self.samples.extend_from_slice(chunk);
        if self.quiet_run >= self.pause_samples || self.samples.len() >= self.max_samples {
            self.samples.truncate(self.max_samples);
            self.state = DetectorState::Complete;
        }
        self.state == DetectorState::Complete
    }

    /// Samples kept so far, from the first loud chunk on.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect()
    }

    fn quiet(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    #[test]
    fn test_downmix_stereo() {
        assert_eq!(downmix(&[0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_halves_length() {
        let out = resample(&[0.0, 1.0, 0.0, 1.0], 2000, 1000);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], 0.0);
        assert_eq!(resample(&[0.5; 3], 1000, 1000), vec![0.5; 3]);
        assert!(resample(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn test_to_pcm16_clamps() {
        assert_eq!(to_pcm16(&[0.0, 1.0, -2.0]), vec![0, i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_detector_ignores_leading_silence() {
        let mut det = UtteranceDetector::new(RATE, 0.1, 0.5, 30);
        assert!(!det.push(&quiet(2000)));
        assert_eq!(det.state(), DetectorState::Waiting);
        assert!(det.into_samples().is_empty());
    }

    #[test]
    fn test_detector_completes_after_pause() {
        let mut det = UtteranceDetector::new(RATE, 0.1, 0.5, 30);
        assert!(!det.push(&tone(300)));
        assert_eq!(det.state(), DetectorState::Speaking);
        assert!(!det.push(&quiet(200)));
        // A loud chunk restarts the pause count.
        assert!(!det.push(&tone(100)));
        assert!(!det.push(&quiet(400)));
        assert!(det.push(&quiet(100)));
        assert_eq!(det.state(), DetectorState::Complete);
        assert_eq!(det.into_samples().len(), 1100);
    }

    #[test]
    fn test_detector_stops_at_phrase_limit() {
        let mut det = UtteranceDetector::new(RATE, 0.1, 5.0, 1);
        assert!(!det.push(&tone(600)));
        assert!(det.push(&tone(600)));
        assert_eq!(det.into_samples().len(), 1000);
    }

    #[test]
    fn test_detector_from_config() {
        let config = SpeechConfig {
            energy_threshold: 0.2,
            pause_secs: 0.1,
            ..SpeechConfig::default()
        };
        let mut det = UtteranceDetector::from_config(&config, RATE);
        assert!(!det.push(&[0.1; 50]));
        assert!(!det.push(&[0.3; 50]));
        assert!(det.push(&quiet(100)));
    }
}
