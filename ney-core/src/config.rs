//! Configuration parameters for recording analysis

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::messages::Locale;
use crate::tuning;

/// Top level configuration, one section per pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub tracker: PitchTrackerConfig,
    pub filter: FilterConfig,
    pub decoder: DecoderConfig,
    /// Language of user-facing messages and recommendations.
    pub locale: Locale,
    /// Longest decoded recording accepted for pitch tracking (default: 120 s)
    pub max_duration_secs: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            tracker: PitchTrackerConfig::default(),
            filter: FilterConfig::default(),
            decoder: DecoderConfig::default(),
            locale: Locale::default(),
            max_duration_secs: 120.0,
        }
    }
}

impl AnalyzerConfig {
    /// Checks every section; call once before serving requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_duration_secs > 0.0 && self.max_duration_secs.is_finite()) {
            return Err(value_error("max_duration_secs", "must be a positive number of seconds"));
        }
        self.tracker.validate()?;
        self.filter.validate()?;
        self.decoder.validate()
    }
}

/// Framing and model parameters of the probabilistic YIN tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchTrackerConfig {
    /// Lowest note searched (default: C2, ~65.4 Hz)
    pub fmin_note: String,

    /// Highest note searched (default: C7, ~2093 Hz)
    pub fmax_note: String,

    /// Samples per analysis frame (default: 2048)
    pub frame_length: usize,

    /// Samples in the difference-function window (default: 1024)
    /// Bounds the longest detectable period to `frame_length - win_length - 1`.
    pub win_length: usize,

    /// Samples between successive frames (default: 512)
    pub hop_length: usize,

    /// Number of YIN thresholds between 0 and 1 (default: 100)
    pub n_thresholds: usize,

    /// Beta distribution (alpha, beta) over the YIN threshold (default: (2, 18))
    pub beta_prior: (f64, f64),

    /// Decay of the prior over successive troughs (default: 2.0)
    /// Larger values favour the first trough under the threshold more strongly.
    pub boltzmann_parameter: f64,

    /// Pitch bin width in semitones (default: 0.1)
    pub resolution: f64,

    /// Fastest pitch glide the HMM allows, in octaves per second (default: 35.92)
    pub max_transition_rate: f64,

    /// Probability of switching between voiced and unvoiced per frame (default: 0.01)
    pub switch_prob: f64,

    /// Prior mass given to the global minimum when no trough is under the threshold
    /// (default: 0.01)
    pub no_trough_prob: f64,
}

impl Default for PitchTrackerConfig {
    fn default() -> Self {
        Self {
            fmin_note: "C2".to_string(),
            fmax_note: "C7".to_string(),
            frame_length: 2048,
            win_length: 1024,
            hop_length: 512,
            n_thresholds: 100,
            beta_prior: (2.0, 18.0),
            boltzmann_parameter: 2.0,
            resolution: 0.1,
            max_transition_rate: 35.92,
            switch_prob: 0.01,
            no_trough_prob: 0.01,
        }
    }
}

impl PitchTrackerConfig {
    /// Search range in Hz, resolved from the configured note names.
    pub fn frequency_range(&self) -> Result<(f64, f64), ConfigError> {
        let fmin = tuning::note_to_hz(&self.fmin_note)?;
        let fmax = tuning::note_to_hz(&self.fmax_note)?;
        if fmin >= fmax {
            return Err(ConfigError::EmptyRange { fmin, fmax });
        }
        Ok((fmin, fmax))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.frequency_range()?;

        if self.frame_length == 0 || self.hop_length == 0 || self.win_length == 0 {
            return Err(ConfigError::Framing(
                "frame, window and hop lengths must be positive".to_string(),
            ));
        }
        if self.win_length + 1 >= self.frame_length {
            return Err(ConfigError::Framing(format!(
                "win_length {} leaves no room for periods inside frame_length {}",
                self.win_length, self.frame_length
            )));
        }
        if self.n_thresholds == 0 {
            return Err(value_error("n_thresholds", "must be at least 1"));
        }
        let (alpha, beta) = self.beta_prior;
        if !(alpha > 0.0 && beta > 0.0) {
            return Err(value_error("beta_prior", "both parameters must be positive"));
        }
        if !(self.boltzmann_parameter > 0.0) {
            return Err(value_error("boltzmann_parameter", "must be positive"));
        }
        if !(self.resolution > 0.0 && self.resolution <= 1.0) {
            return Err(value_error("resolution", "must be in (0, 1] semitones"));
        }
        if !(self.max_transition_rate > 0.0) {
            return Err(value_error("max_transition_rate", "must be positive"));
        }
        if !(self.switch_prob > 0.0 && self.switch_prob < 1.0) {
            return Err(value_error("switch_prob", "must be strictly between 0 and 1"));
        }
        if !(0.0..=1.0).contains(&self.no_trough_prob) {
            return Err(value_error("no_trough_prob", "must be between 0 and 1"));
        }
        Ok(())
    }
}

/// Which frames count as evidence for the final pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// A frame must be voiced with probability strictly above this (default: 0.6)
    pub min_voiced_probability: f64,

    /// Fewer surviving frames than this is rejected (default: 5)
    pub min_voiced_frames: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_voiced_probability: 0.6,
            min_voiced_frames: 5,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.min_voiced_probability) {
            return Err(value_error("min_voiced_probability", "must be in [0, 1)"));
        }
        if self.min_voiced_frames == 0 {
            return Err(value_error("min_voiced_frames", "must be at least 1"));
        }
        Ok(())
    }
}

/// Where the decoder keeps scratch files and how it calls the transcoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Directory for the temporary upload copy and transcoded output.
    /// `None` uses the system temp directory.
    pub upload_dir: Option<PathBuf>,

    /// Transcoder executable used when the built-in decoder fails (default: ffmpeg)
    pub transcoder_program: String,

    /// Wall-clock bound for one transcoder run (default: 30 s)
    pub transcode_timeout_secs: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            upload_dir: None,
            transcoder_program: "ffmpeg".to_string(),
            transcode_timeout_secs: 30,
        }
    }
}

impl DecoderConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transcoder_program.trim().is_empty() {
            return Err(value_error("transcoder_program", "must not be empty"));
        }
        if self.transcode_timeout_secs == 0 {
            return Err(value_error("transcode_timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

fn value_error(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Value {
        field,
        reason: reason.to_string(),
    }
}
