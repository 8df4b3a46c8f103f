//! # Audio Buffer Module
//!
//! The decoded recording handed from the decoder to the pitch tracker, plus optional
//! microphone capture (feature `microphone`) using CPAL (Cross-Platform Audio Library).
//!
//! ## Features
//! - Mono `f32` samples at the source's native sample rate, never resampled
//! - Channel-average downmix of interleaved multi-channel audio
//! - Finite clip recording from the default input device

use crate::error::AnalysisError;

/// Mono PCM samples with their sample rate.
///
/// Always holds at least one sample and a positive sample rate. It is immutable once
/// built; every request owns its own buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wraps mono samples.
    ///
    /// # Errors
    /// * `AnalysisError::Internal` if `samples` is empty or `sample_rate` is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::Internal("audio contains no samples".to_string()));
        }
        if sample_rate == 0 {
            return Err(AnalysisError::Internal("audio has a zero sample rate".to_string()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Builds a buffer from interleaved samples, averaging the channels to mono.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self, AnalysisError> {
        if channels == 0 {
            return Err(AnalysisError::Internal("audio has zero channels".to_string()));
        }
        Self::new(downmix_to_mono(interleaved, channels), sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Averages interleaved channels into one.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

#[cfg(feature = "microphone")]
pub use capture::record_clip;

#[cfg(feature = "microphone")]
mod capture {
    use std::time::{Duration, Instant};

    use anyhow::{Result, anyhow};
    use cpal::SupportedStreamConfigRange;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    use super::AudioBuffer;

    /// Preferred capture rate; the device's nearest supported rate is used otherwise.
    const TARGET_SAMPLE_RATE: u32 = 44100;

    /// Samples per chunk sent from the audio callback to the collecting thread.
    const CHUNK_SIZE: usize = 2048;

    /// Records a clip of `duration` from the default input device.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks an `f32` configuration, mono if available, near 44.1 kHz
    /// 3. Collects interleaved chunks from the callback until the clip is complete
    /// 4. Stops the stream and downmixes to mono
    ///
    /// # Returns
    /// * `Ok(buffer)` - The recorded clip at the device's sample rate
    /// * `Err(e)` - No device, no usable format, or a stream failure
    pub fn record_clip(duration: Duration) -> Result<AudioBuffer> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        tracing::info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let rate = TARGET_SAMPLE_RATE.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let config: cpal::StreamConfig = config.into();

        tracing::info!("Recording {:?} at {} Hz, {} channel(s)", duration, sample_rate, channels);

        let (sender, receiver) = crossbeam_channel::unbounded::<Vec<f32>>();
        let err_fn = |err| tracing::error!("An error occurred on the audio stream: {}", err);

        // Accumulates callback data until a full chunk can be sent.
        let mut pending = Vec::with_capacity(CHUNK_SIZE * 2);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                while pending.len() >= CHUNK_SIZE {
                    let chunk: Vec<f32> = pending.drain(..CHUNK_SIZE).collect();
                    // The receiver is gone once recording is complete.
                    let _ = sender.send(chunk);
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        let wanted = (duration.as_secs_f64() * sample_rate as f64) as usize * channels;
        let deadline = Instant::now() + duration + Duration::from_secs(2);
        let mut interleaved = Vec::with_capacity(wanted);

        while interleaved.len() < wanted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(chunk) => interleaved.extend_from_slice(&chunk),
                Err(_) => return Err(anyhow!("Input device stopped delivering audio")),
            }
        }
        drop(stream);

        interleaved.truncate(wanted);
        Ok(AudioBuffer::from_interleaved(&interleaved, channels, sample_rate)?)
    }

    /// Finds the best supported input configuration for the target sample rate.
    ///
    /// Only `f32` formats qualify. Mono beats multi-channel, then the closest rate
    /// range wins.
    fn find_supported_config(
        configs: Vec<SupportedStreamConfigRange>,
        target_rate: u32,
    ) -> Option<SupportedStreamConfigRange> {
        configs
            .into_iter()
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .min_by_key(|c| {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                let in_range = c.min_sample_rate().0 <= target_rate
                    && target_rate <= c.max_sample_rate().0;
                let rate_penalty = if in_range { 0 } else { min_diff.min(max_diff) };
                (c.channels() != 1, rate_penalty)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_to_mono() {
        // Stereo: L=1.0, R=0.0 -> mono=0.5
        let stereo = vec![1.0, 0.0, 0.5, 0.5, 0.0, 1.0];
        let buffer = AudioBuffer::from_interleaved(&stereo, 2, 8000).unwrap();
        assert_eq!(buffer.len(), 3);
        for s in buffer.samples() {
            assert!((s - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_partial_frame_dropped() {
        let buffer = AudioBuffer::from_interleaved(&[0.2, 0.4, 0.6, 0.8, 1.0], 2, 8000).unwrap();
        assert_eq!(buffer.len(), 2);
        assert!((buffer.samples()[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_empty_and_zero_rate() {
        assert!(AudioBuffer::new(vec![], 44100).is_err());
        assert!(AudioBuffer::new(vec![0.0], 0).is_err());
        assert!(AudioBuffer::from_interleaved(&[0.0, 0.0], 0, 44100).is_err());
        // One channel of a stereo frame is not enough for a sample.
        assert!(AudioBuffer::from_interleaved(&[0.1], 2, 44100).is_err());
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 22050], 44100).unwrap();
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_len_and_is_empty() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2], 8000).unwrap();
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_empty());
    }
}
