//! Selection of the frames that count as evidence for the recording's pitch.

use crate::config::FilterConfig;
use crate::error::AnalysisError;
use crate::pitch::FrameEstimate;

/// Keeps confidently voiced frames and rejects recordings with too few of them.
#[derive(Debug, Clone)]
pub struct VoicedFrameFilter {
    min_voiced_probability: f64,
    min_voiced_frames: usize,
}

impl VoicedFrameFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            min_voiced_probability: config.min_voiced_probability,
            min_voiced_frames: config.min_voiced_frames,
        }
    }

    /// Frequencies of the frames that are voiced, have a finite frequency, and whose
    /// voicing probability is strictly above the threshold. Frame order is kept.
    ///
    /// # Errors
    /// * `AnalysisError::InsufficientEvidence` if fewer than `min_voiced_frames` remain
    pub fn retain(&self, frames: &[FrameEstimate]) -> Result<Vec<f64>, AnalysisError> {
        let retained: Vec<f64> = frames
            .iter()
            .filter(|f| {
                f.voiced
                    && f.frequency.is_finite()
                    && f.voiced_probability > self.min_voiced_probability
            })
            .map(|f| f.frequency)
            .collect();

        tracing::debug!(
            total = frames.len(),
            retained = retained.len(),
            "voiced frames selected"
        );

        if retained.len() < self.min_voiced_frames {
            return Err(AnalysisError::InsufficientEvidence {
                found: retained.len(),
                required: self.min_voiced_frames,
            });
        }
        Ok(retained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frequency: f64, voiced: bool, voiced_probability: f64) -> FrameEstimate {
        FrameEstimate {
            frequency,
            voiced,
            voiced_probability,
            time_secs: 0.0,
        }
    }

    fn filter() -> VoicedFrameFilter {
        VoicedFrameFilter::new(&FilterConfig::default())
    }

    #[test]
    fn test_threshold_is_strict() {
        let frames = vec![frame(440.0, true, 0.6); 10];
        assert_eq!(
            filter().retain(&frames),
            Err(AnalysisError::InsufficientEvidence { found: 0, required: 5 })
        );
    }

    #[test]
    fn test_exactly_minimum_is_accepted() {
        let mut frames = vec![frame(440.0, true, 0.61); 5];
        frames.push(frame(f64::NAN, false, 0.9));
        frames.push(frame(220.0, false, 0.9));
        frames.push(frame(f64::NAN, true, 0.9));
        assert_eq!(filter().retain(&frames).unwrap(), vec![440.0; 5]);
    }

    #[test]
    fn test_four_frames_rejected() {
        let frames = vec![frame(440.0, true, 0.99); 4];
        assert!(matches!(
            filter().retain(&frames),
            Err(AnalysisError::InsufficientEvidence { found: 4, required: 5 })
        ));
    }

    #[test]
    fn test_order_preserved() {
        let frames: Vec<_> = (0..6).map(|i| frame(400.0 + i as f64, true, 0.8)).collect();
        assert_eq!(
            filter().retain(&frames).unwrap(),
            vec![400.0, 401.0, 402.0, 403.0, 404.0, 405.0]
        );
    }
}
