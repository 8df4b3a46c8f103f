//! # Deviation Module
//!
//! Turns the gap between the measured pitch and its nearest tempered note into a
//! calibration: how far the player is off in cents, which A4 they are effectively
//! tuned to, and which ney scale would bring them back to 440 Hz.

use crate::error::AnalysisError;
use crate::messages::{self, Locale};
use crate::tuning::{self, A4_HZ};

/// Calibration derived from one measured note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Signed deviation of the measured pitch from its nearest note.
    pub cents: f64,
    /// The A4 the player effectively produces, `440 * 2^(cents / 1200)`.
    pub a4_actual: f64,
    /// What a 440 Hz ney sounds like with this player's breath, rounded to 0.01 Hz.
    /// Numerically the same as `a4_actual`; kept as its own quantity because
    /// consumers address it by this name.
    pub ney_at_440_produces: f64,
    /// Ney scale that would sound an in-tune 440 Hz for this player, rounded to
    /// 0.01 Hz and derived from the unrounded `a4_actual`.
    pub ideal_ney_for_440: f64,
}

impl Calibration {
    /// Computes the calibration for a measured frequency and its reference note.
    ///
    /// # Errors
    /// * `AnalysisError::InvalidFrequency` unless both frequencies are positive and finite
    pub fn from_frequencies(measured: f64, standard: f64) -> Result<Self, AnalysisError> {
        let valid = |f: f64| f.is_finite() && f > 0.0;
        if !valid(measured) || !valid(standard) {
            return Err(AnalysisError::InvalidFrequency { measured, standard });
        }

        let cents = tuning::cents_between(measured, standard);
        let a4_actual = A4_HZ * 2.0_f64.powf(cents / 1200.0);

        Ok(Self {
            cents,
            a4_actual,
            ney_at_440_produces: round2(A4_HZ * (a4_actual / A4_HZ)),
            ideal_ney_for_440: round2(A4_HZ * (A4_HZ / a4_actual)),
        })
    }

    /// Advice for a player on a standard 440 Hz ney.
    pub fn recommendation_standard(&self, locale: Locale) -> String {
        messages::recommendation_standard(locale, self.ney_at_440_produces, self.ideal_ney_for_440)
    }

    /// The player's own breath scale.
    pub fn recommendation_custom(&self, locale: Locale) -> String {
        messages::recommendation_custom(locale, round2(self.a4_actual))
    }
}

/// Rounds to two decimals, half away from zero, without producing `-0.0`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_tune_note() {
        let cal = Calibration::from_frequencies(440.0, 440.0).unwrap();
        assert_eq!(cal.cents, 0.0);
        assert_eq!(cal.a4_actual, 440.0);
        assert_eq!(cal.ney_at_440_produces, 440.0);
        assert_eq!(cal.ideal_ney_for_440, 440.0);
    }

    #[test]
    fn test_sharp_player() {
        // 25 cents sharp of E5
        let standard = 659.2551138257398;
        let measured = standard * 2.0_f64.powf(25.0 / 1200.0);
        let cal = Calibration::from_frequencies(measured, standard).unwrap();
        assert!((cal.cents - 25.0).abs() < 1e-9);
        assert!((cal.a4_actual - 446.39995).abs() < 1e-4);
        assert_eq!(cal.ney_at_440_produces, 446.4);
        assert_eq!(cal.ideal_ney_for_440, 433.69);
    }

    #[test]
    fn test_ney_at_440_equals_rounded_a4() {
        for cents in [-49.0, -12.3, 0.4, 7.77, 33.0, 49.9] {
            let measured = 300.0 * 2.0_f64.powf(cents / 1200.0);
            let cal = Calibration::from_frequencies(measured, 300.0).unwrap();
            assert_eq!(cal.ney_at_440_produces, round2(cal.a4_actual));
        }
    }

    #[test]
    fn test_ideal_ney_round_trip() {
        let cal = Calibration::from_frequencies(452.0, 440.0).unwrap();
        let back = A4_HZ * (A4_HZ / cal.ideal_ney_for_440);
        assert!((back - cal.a4_actual).abs() < 0.01);
    }

    #[test]
    fn test_one_cent_step() {
        let a = Calibration::from_frequencies(441.0, 440.0).unwrap();
        let b = Calibration::from_frequencies(441.0 * 2.0_f64.powf(1.0 / 1200.0), 440.0).unwrap();
        assert!((b.cents - a.cents - 1.0).abs() < 1e-9);
        assert!((b.a4_actual / a.a4_actual - 2.0_f64.powf(1.0 / 1200.0)).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_positive() {
        for (m, s) in [(0.0, 440.0), (440.0, 0.0), (-1.0, 440.0), (f64::NAN, 440.0)] {
            assert!(matches!(
                Calibration::from_frequencies(m, s),
                Err(AnalysisError::InvalidFrequency { .. })
            ));
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(440.004), 440.0);
        assert_eq!(round2(440.006), 440.01);
        assert_eq!(round2(-0.001), 0.0);
        assert!(round2(-0.001).is_sign_positive());
        assert_eq!(round2(-12.345678), -12.35);
    }

    #[test]
    fn test_recommendations() {
        let cal = Calibration::from_frequencies(440.0, 440.0).unwrap();
        assert!(cal.recommendation_standard(Locale::En).contains("440.00 Hz"));
        assert_eq!(
            cal.recommendation_custom(Locale::En),
            "Your actual breath scale is 440.00 Hz."
        );
    }
}
