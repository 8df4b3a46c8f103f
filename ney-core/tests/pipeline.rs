mod common;

use common::{buffer, noise, sine};
use ney_core::deviation::round2;
use ney_core::tuning::{A4_HZ, find_nearest_note};
use ney_core::{AnalysisError, AnalyzerConfig, Calibration, Locale, PitchResult, analyze_buffer};

#[test]
fn test_a4_sine() {
    for sample_rate in [22050, 44100] {
        let result =
            analyze_buffer(&buffer(sine(440.0, sample_rate, 1.5), sample_rate), &AnalyzerConfig::default())
                .unwrap();
        assert_eq!(result.note_actual, "A4");
        assert!((result.f_standard - 440.0).abs() < 1e-9);
        assert!(result.cents.abs() < 5.0, "{} Hz: {} cents", sample_rate, result.cents);
        assert!((result.a4_actual - 440.0).abs() < 1.5);
    }
}

#[test]
fn test_a_sharp_4_sine() {
    let result = analyze_buffer(&buffer(sine(466.16, 44100, 1.5), 44100), &AnalyzerConfig::default())
        .unwrap();
    assert_eq!(result.note_actual, "A#4");
    assert!((result.f_standard - 466.1637615).abs() < 1e-6);
    assert!(result.cents.abs() < 5.0);
}

#[test]
fn test_low_register_note() {
    // G2, near the bottom of the search range
    let result = analyze_buffer(&buffer(sine(98.0, 44100, 2.0), 44100), &AnalyzerConfig::default())
        .unwrap();
    assert_eq!(result.note_actual, "G2");
}

#[test]
fn test_cents_follow_one_cent_steps() {
    let cents: Vec<f64> = (0..=8)
        .map(|k| {
            let freq = 440.0 * 2.0_f64.powf(k as f64 / 1200.0);
            analyze_buffer(&buffer(sine(freq, 44100, 1.5), 44100), &AnalyzerConfig::default())
                .unwrap()
                .cents
        })
        .collect();

    for pair in cents.windows(2) {
        let step = pair[1] - pair[0];
        assert!(step > 0.3 && step < 1.7, "step {step} in {cents:?}");
    }
    let total = cents[8] - cents[0];
    assert!((total - 8.0).abs() < 1.5, "total {total} in {cents:?}");
}

#[test]
fn test_recording_over_the_duration_limit() {
    let config = AnalyzerConfig {
        max_duration_secs: 1.0,
        ..Default::default()
    };
    let err = analyze_buffer(&buffer(sine(440.0, 22050, 1.5), 22050), &config).unwrap_err();
    match err {
        AnalysisError::TooLong { duration_secs, max_secs } => {
            assert!((duration_secs - 1.5).abs() < 1e-9);
            assert_eq!(max_secs, 1.0);
        }
        other => panic!("expected TooLong, got {other:?}"),
    }

    // At the limit is still analysed.
    let result = analyze_buffer(&buffer(sine(440.0, 22050, 1.0), 22050), &config).unwrap();
    assert_eq!(result.note_actual, "A4");
}

#[test]
fn test_silence_is_insufficient() {
    let err = analyze_buffer(&buffer(vec![0.0; 44100], 44100), &AnalyzerConfig::default())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientEvidence { found: 0, required: 5 }));
}

#[test]
fn test_noise_is_insufficient() {
    let err = analyze_buffer(&buffer(noise(44100, 7), 44100), &AnalyzerConfig::default())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientEvidence { .. }), "{err:?}");
}

#[test]
fn test_too_short_for_five_frames() {
    // Enough for three frames at hop 512.
    let err = analyze_buffer(&buffer(sine(440.0, 44100, 0.03), 44100), &AnalyzerConfig::default())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientEvidence { .. }));
}

#[test]
fn test_english_locale() {
    let config = AnalyzerConfig {
        locale: Locale::En,
        ..Default::default()
    };
    let result = analyze_buffer(&buffer(sine(440.0, 44100, 1.0), 44100), &config).unwrap();
    assert_eq!(result.recommendation_custom, "Your actual breath scale is 440.00 Hz.");
    assert!(result.recommendation_standard.contains("440.00 Hz"));
}

#[test]
fn test_default_locale_is_arabic() {
    let result = analyze_buffer(&buffer(sine(440.0, 44100, 1.0), 44100), &AnalyzerConfig::default())
        .unwrap();
    assert!(result.recommendation_custom.starts_with("مقياس نفختك الفعلي هو"));
}

#[test]
fn test_json_fields_have_two_decimals_across_range() {
    let mut freq = 65.0;
    while freq < 2100.0 {
        let note = find_nearest_note(freq);
        let cal = Calibration::from_frequencies(freq, note.frequency).unwrap();
        let result = PitchResult::new(freq, &note, &cal, Locale::En);
        let value: serde_json::Value = serde_json::to_value(&result).unwrap();
        let json = serde_json::to_string(&result).unwrap();

        for field in ["f_actual", "f_standard", "cents", "a4_actual"] {
            let number = value[field].as_f64().unwrap();
            assert_eq!(number, round2(number), "{field} at {freq} Hz");
            let start = json.find(&format!("\"{field}\":")).unwrap() + field.len() + 3;
            let text: String = json[start..].chars().take_while(|&c| c != ',').collect();
            let decimals = text.split('.').nth(1).unwrap();
            assert_eq!(decimals.len(), 2, "{field} = {text} at {freq} Hz");
        }
        assert!(result.cents.abs() <= 50.0 + 1e-9);
        freq *= 1.0137;
    }
}

#[test]
fn test_ideal_ney_maps_back_to_440() {
    for measured in [430.0, 437.5, 445.2, 452.0] {
        let cal = Calibration::from_frequencies(measured, 440.0).unwrap();
        // A player whose breath sits at `a4_actual` on a ney scaled at the ideal value.
        let produced = cal.a4_actual * (cal.ideal_ney_for_440 / A4_HZ);
        assert!((produced - A4_HZ).abs() < 0.01, "{measured}: {produced}");
    }
}
