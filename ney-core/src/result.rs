//! The analysis result returned to callers.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::deviation::{Calibration, round2};
use crate::messages::Locale;
use crate::tuning::NoteMatch;

/// Outcome of analysing one recording.
///
/// Frequencies and cents are kept at full precision; serialization writes them as
/// JSON numbers with exactly two decimals (`440.00`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchResult {
    /// Median frequency of the reliable voiced frames, Hz.
    #[serde(serialize_with = "two_decimals")]
    pub f_actual: f64,
    /// Nearest equal-tempered note, e.g. `A#4`.
    pub note_actual: String,
    /// Exact frequency of `note_actual`, Hz.
    #[serde(serialize_with = "two_decimals")]
    pub f_standard: f64,
    #[serde(serialize_with = "two_decimals")]
    pub cents: f64,
    #[serde(serialize_with = "two_decimals")]
    pub a4_actual: f64,
    pub recommendation_standard: String,
    pub recommendation_custom: String,
}

impl PitchResult {
    pub fn new(f_actual: f64, note: &NoteMatch, calibration: &Calibration, locale: Locale) -> Self {
        Self {
            f_actual,
            note_actual: note.note.name(),
            f_standard: note.frequency,
            cents: calibration.cents,
            a4_actual: calibration.a4_actual,
            recommendation_standard: calibration.recommendation_standard(locale),
            recommendation_custom: calibration.recommendation_custom(locale),
        }
    }
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::Error;

    if !value.is_finite() {
        return Err(S::Error::custom(format!("cannot serialize {value} as a frequency")));
    }
    let raw = RawValue::from_string(format!("{:.2}", round2(*value))).map_err(S::Error::custom)?;
    raw.serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::find_nearest_note;

    fn result_for(freq: f64) -> PitchResult {
        let note = find_nearest_note(freq);
        let cal = Calibration::from_frequencies(freq, note.frequency).unwrap();
        PitchResult::new(freq, &note, &cal, Locale::En)
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&result_for(440.0)).unwrap();
        assert!(json.starts_with(r#"{"f_actual":440.00,"note_actual":"A4","f_standard":440.00,"cents":0.00,"a4_actual":440.00,"#));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_two_decimals_everywhere() {
        let result = result_for(447.123456);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""f_actual":447.12,"#), "{json}");
        assert!(json.contains(r#""f_standard":440.00,"#), "{json}");
        assert!(json.contains(r#""cents":"#));
        let parsed: PitchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.note_actual, "A4");
        assert_eq!(parsed.f_actual, 447.12);
    }

    #[test]
    fn test_negative_cents_and_no_negative_zero() {
        let flat = result_for(438.0);
        let json = serde_json::to_string(&flat).unwrap();
        assert!(json.contains(r#""cents":-7.89,"#), "{json}");

        let barely = result_for(440.0 * 2.0_f64.powf(-0.001 / 1200.0));
        let json = serde_json::to_string(&barely).unwrap();
        assert!(json.contains(r#""cents":0.00,"#), "{json}");
    }

    #[test]
    fn test_non_finite_is_an_error() {
        let mut result = result_for(440.0);
        result.f_actual = f64::NAN;
        assert!(serde_json::to_string(&result).is_err());
    }
}
