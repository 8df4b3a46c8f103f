// ney-core/src/lib.rs

//! The core logic for ney pitch calibration.
//! This crate decodes a recorded tone, tracks its pitch, and turns the
//! deviation from the nearest tempered note into tuning advice. It is
//! completely headless and contains no HTTP code.

pub mod aggregate;
pub mod audio;
pub mod config;
pub mod decoder;
pub mod deviation;
pub mod distribution;
pub mod error;
pub mod fft;
pub mod hmm;
pub mod messages;
pub mod pitch;
pub mod result;
pub mod tuning;
pub mod voicing;

pub use aggregate::FrequencyAggregator;
pub use audio::AudioBuffer;
pub use config::AnalyzerConfig;
pub use decoder::{AudioDecoder, FfmpegTranscoder, Transcoder};
pub use deviation::Calibration;
pub use error::{AnalysisError, ConfigError, ErrorKind, MissingInputKind, TranscodeError};
pub use messages::Locale;
pub use pitch::{FrameEstimate, PitchTracker};
pub use result::PitchResult;
pub use voicing::VoicedFrameFilter;

/// Runs the whole pipeline on an uploaded recording.
///
/// # Errors
/// * `AnalysisError::MissingInput` if `bytes` is empty
/// * Any error of [`AudioDecoder::decode`] or [`analyze_buffer`]
pub fn analyze_recording(
    bytes: &[u8],
    decoder: &AudioDecoder,
    config: &AnalyzerConfig,
) -> Result<PitchResult, AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::MissingInput(MissingInputKind::EmptyFile));
    }
    let audio = decoder.decode(bytes)?;
    analyze_buffer(&audio, config)
}

/// Runs the pipeline on already decoded audio.
///
/// This function:
/// 1. Tracks the pitch of every frame
/// 2. Keeps the confidently voiced frames, rejecting recordings with too few
/// 3. Takes the median of their frequencies
/// 4. Snaps the median to the nearest tempered note
/// 5. Derives the calibration and the recommendations
pub fn analyze_buffer(
    audio: &AudioBuffer,
    config: &AnalyzerConfig,
) -> Result<PitchResult, AnalysisError> {
    analyze_buffer_with_frames(audio, config).map(|(result, _)| result)
}

/// Like [`analyze_buffer`], also returning the per-frame track the result was
/// derived from.
///
/// # Errors
/// * `AnalysisError::TooLong` if the recording exceeds `config.max_duration_secs`
pub fn analyze_buffer_with_frames(
    audio: &AudioBuffer,
    config: &AnalyzerConfig,
) -> Result<(PitchResult, Vec<FrameEstimate>), AnalysisError> {
    let duration_secs = audio.duration_secs();
    if duration_secs > config.max_duration_secs {
        tracing::warn!(
            "Rejecting {:.1}s recording, limit is {:.1}s",
            duration_secs,
            config.max_duration_secs
        );
        return Err(AnalysisError::TooLong {
            duration_secs,
            max_secs: config.max_duration_secs,
        });
    }

    let tracker = PitchTracker::new(&config.tracker)
        .map_err(|e| AnalysisError::Internal(format!("invalid tracker configuration: {e}")))?;
    let frames = tracker.track(audio)?;

    let voiced = VoicedFrameFilter::new(&config.filter).retain(&frames)?;
    let f_actual = FrequencyAggregator::Median.aggregate(&voiced)?;
    tracing::info!(
        "Median frequency {:.2} Hz from {} of {} frames",
        f_actual,
        voiced.len(),
        frames.len()
    );

    let note = tuning::find_nearest_note(f_actual);
    let calibration = Calibration::from_frequencies(f_actual, note.frequency)?;
    tracing::debug!(
        note = %note.note,
        cents = calibration.cents,
        a4_actual = calibration.a4_actual,
        "calibration computed"
    );

    Ok((PitchResult::new(f_actual, &note, &calibration, config.locale), frames))
}
