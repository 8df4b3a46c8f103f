//! # Frequency Aggregation Module
//!
//! Reduces the per-frame frequencies of a recording to the single value reported to
//! the player.

use crate::error::AnalysisError;

/// Strategies for collapsing voiced-frame frequencies into one estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrequencyAggregator {
    /// Middle value, or the mean of the two middle values for an even count.
    /// Octave errors in a minority of frames do not move it.
    #[default]
    Median,
}

impl FrequencyAggregator {
    /// Aggregates the retained frequencies.
    ///
    /// # Returns
    /// * `Ok(f)` - The representative frequency in Hz
    /// * `Err(AnalysisError::Internal)` - `frequencies` was empty or held a non-finite value
    pub fn aggregate(&self, frequencies: &[f64]) -> Result<f64, AnalysisError> {
        if frequencies.iter().any(|f| !f.is_finite()) {
            return Err(AnalysisError::Internal(
                "non-finite frequency reached aggregation".to_string(),
            ));
        }
        match self {
            FrequencyAggregator::Median => median(frequencies).ok_or_else(|| {
                AnalysisError::Internal("no frequencies to aggregate".to_string())
            }),
        }
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_and_even_counts() {
        let agg = FrequencyAggregator::Median;
        assert_eq!(agg.aggregate(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_eq!(agg.aggregate(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert_eq!(agg.aggregate(&[7.5]).unwrap(), 7.5);
    }

    #[test]
    fn test_robust_to_octave_errors() {
        let frames = [440.0, 441.0, 880.0, 439.5, 220.0, 440.5, 440.2];
        assert_eq!(FrequencyAggregator::Median.aggregate(&frames).unwrap(), 440.2);
    }

    #[test]
    fn test_empty_and_nan_rejected() {
        let agg = FrequencyAggregator::default();
        assert!(matches!(agg.aggregate(&[]), Err(AnalysisError::Internal(_))));
        assert!(matches!(
            agg.aggregate(&[440.0, f64::NAN]),
            Err(AnalysisError::Internal(_))
        ));
    }
}
