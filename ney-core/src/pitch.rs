//! # Pitch Detection Module
//!
//! Frame-wise fundamental frequency tracking with the probabilistic YIN (pYIN)
//! algorithm. Instead of a single YIN threshold, every threshold between 0 and 1 is
//! tried and weighted by a Beta prior; the resulting pitch candidates feed a hidden
//! Markov model that also decides whether each frame is voiced.
//!
//! ## Features
//! - FFT-based cumulative mean normalized difference function
//! - Parabolic interpolation for sub-sample period accuracy
//! - Per-frame voicing probability, not just a voiced/unvoiced flag
//! - Viterbi smoothing that suppresses isolated octave jumps

use crate::audio::AudioBuffer;
use crate::config::PitchTrackerConfig;
use crate::distribution::{beta_interval_probs, boltzmann_pmf};
use crate::error::{AnalysisError, ConfigError};
use crate::fft::WindowedAutocorrelation;
use crate::hmm::{MAX_STATES, PitchHmm};

/// Magnitudes below this are treated as exact zeros in the difference function.
const ZERO_FLOOR: f64 = 1e-6;

/// Pitch estimate for one analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEstimate {
    /// Fundamental frequency in Hz, `NaN` when the frame has no pitch.
    pub frequency: f64,
    /// Voicing decision of the smoothed track.
    pub voiced: bool,
    /// Probability in [0, 1] that the frame is voiced.
    pub voiced_probability: f64,
    /// Frame centre in seconds from the start of the recording.
    pub time_secs: f64,
}

/// A pitch bin that received probability mass in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PitchCandidate {
    bin: usize,
    probability: f64,
    /// Interpolated frequency of the strongest trough that landed in the bin.
    frequency: f64,
    strongest: f64,
}

/// Candidates of one frame before smoothing. Bins without a candidate have zero mass.
struct FrameObservation {
    candidates: Vec<PitchCandidate>,
    voiced_probability: f64,
}

/// Probabilistic YIN pitch tracker.
///
/// Construction resolves the configuration once; [`PitchTracker::track`] can then be
/// called for any number of recordings at any sample rate.
#[derive(Debug, Clone)]
pub struct PitchTracker {
    config: PitchTrackerConfig,
    fmin: f64,
    fmax: f64,
    /// Upper edge of each threshold interval.
    thresholds: Vec<f64>,
    /// Beta prior mass of each threshold interval.
    threshold_probs: Vec<f64>,
    bins_per_semitone: usize,
    n_pitch_bins: usize,
}

impl PitchTracker {
    pub fn new(config: &PitchTrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (fmin, fmax) = config.frequency_range()?;

        let n = config.n_thresholds;
        let edges: Vec<f64> = (0..=n).map(|i| i as f64 / n as f64).collect();
        let (alpha, beta) = config.beta_prior;
        let threshold_probs = beta_interval_probs(&edges, alpha, beta);

        let bins_per_semitone = (1.0 / config.resolution).ceil() as usize;
        let n_pitch_bins =
            (12.0 * bins_per_semitone as f64 * (fmax / fmin).log2()).floor() as usize + 1;
        if 2 * n_pitch_bins > MAX_STATES {
            return Err(ConfigError::Value {
                field: "resolution",
                reason: format!("{n_pitch_bins} pitch bins exceed the tracker's state limit"),
            });
        }

        Ok(Self {
            config: config.clone(),
            fmin,
            fmax,
            thresholds: edges[1..].to_vec(),
            threshold_probs,
            bins_per_semitone,
            n_pitch_bins,
        })
    }

    /// Centre frequency of a pitch bin.
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        self.fmin * 2.0_f64.powf(bin as f64 / (12.0 * self.bins_per_semitone as f64))
    }

    pub fn n_pitch_bins(&self) -> usize {
        self.n_pitch_bins
    }

    /// Estimates the pitch of every frame of `audio`.
    ///
    /// Frames are centred: the signal is zero padded by half a frame on both sides,
    /// so frame `t` is centred on sample `t * hop_length`.
    ///
    /// The smoothed track chooses a bin per frame; the reported frequency is the
    /// interpolated trough frequency behind that bin, not the bin centre.
    ///
    /// # Errors
    /// * `AnalysisError::Internal` if the sample rate cannot resolve any period in
    ///   the configured range with the configured frame size
    pub fn track(&self, audio: &AudioBuffer) -> Result<Vec<FrameEstimate>, AnalysisError> {
        let cfg = &self.config;
        let sr = audio.sample_rate() as f64;

        let min_period = ((sr / self.fmax).floor() as usize).max(1);
        let max_period =
            ((sr / self.fmin).ceil() as usize).min(cfg.frame_length - cfg.win_length - 1);
        if min_period >= max_period {
            return Err(AnalysisError::Internal(format!(
                "sample rate {} Hz cannot resolve periods between {:.1} and {:.1} Hz",
                audio.sample_rate(),
                self.fmin,
                self.fmax
            )));
        }

        let padded = center_pad(audio.samples(), cfg.frame_length);
        let n_frames = 1 + (padded.len() - cfg.frame_length) / cfg.hop_length;
        let acf = WindowedAutocorrelation::new(cfg.frame_length, cfg.win_length);

        let mut candidates = Vec::with_capacity(n_frames);
        let mut voiced_probs = Vec::with_capacity(n_frames);
        for t in 0..n_frames {
            let start = t * cfg.hop_length;
            let frame = &padded[start..start + cfg.frame_length];
            let yin = cumulative_mean_normalized_difference(
                frame,
                &acf,
                cfg.win_length,
                min_period,
                max_period,
            );
            let obs = self.frame_observation(&yin, sr, min_period);
            voiced_probs.push(obs.voiced_probability);
            candidates.push(obs.candidates);
        }

        let observations: Vec<Vec<(usize, f64)>> = candidates
            .iter()
            .map(|frame| frame.iter().map(|c| (c.bin, c.probability)).collect())
            .collect();

        let max_semitones_per_frame =
            (cfg.max_transition_rate * 12.0 * cfg.hop_length as f64 / sr).round() as usize;
        let transition_width = max_semitones_per_frame * self.bins_per_semitone + 1;
        let hmm = PitchHmm::new(self.n_pitch_bins, transition_width, cfg.switch_prob);
        let states = hmm.decode(&observations, &voiced_probs);

        tracing::debug!(
            frames = n_frames,
            min_period,
            max_period,
            transition_width,
            "pitch track decoded"
        );

        Ok(states
            .iter()
            .zip(voiced_probs)
            .enumerate()
            .map(|(t, (state, voiced_probability))| FrameEstimate {
                frequency: if state.voiced {
                    self.refined_frequency(&candidates[t], state.bin)
                } else {
                    f64::NAN
                },
                voiced: state.voiced,
                voiced_probability,
                time_secs: (t * cfg.hop_length) as f64 / sr,
            })
            .collect())
    }

    /// Frequency reported for a decoded voiced bin.
    ///
    /// Uses the frame's candidate in that bin, or the nearest one within a semitone
    /// when smoothing moved the track off its own frame's candidates. Falls back to
    /// the bin centre when there is none.
    fn refined_frequency(&self, candidates: &[PitchCandidate], bin: usize) -> f64 {
        candidates
            .iter()
            .filter(|c| c.bin.abs_diff(bin) <= self.bins_per_semitone)
            .min_by(|a, b| {
                a.bin
                    .abs_diff(bin)
                    .cmp(&b.bin.abs_diff(bin))
                    .then(b.probability.total_cmp(&a.probability))
            })
            .map_or_else(|| self.bin_frequency(bin), |c| c.frequency)
    }

    /// Spreads one frame's trough candidates over the pitch bins.
    ///
    /// For each threshold, the troughs of the difference function below it share
    /// that threshold's prior mass, earlier (shorter period) troughs getting more via
    /// a Boltzmann distribution over their rank. If no trough is below a threshold,
    /// a small share of its mass goes to the deepest trough instead.
    fn frame_observation(&self, yin: &[f64], sr: f64, min_period: usize) -> FrameObservation {
        let troughs = find_troughs(yin);
        if troughs.is_empty() {
            return FrameObservation {
                candidates: Vec::new(),
                voiced_probability: 0.0,
            };
        }

        let heights: Vec<f64> = troughs.iter().map(|&i| yin[i]).collect();
        let mut probs = vec![0.0; troughs.len()];

        for (&threshold, &mass) in self.thresholds.iter().zip(&self.threshold_probs) {
            let n_below = heights.iter().filter(|&&h| h < threshold).count();
            if n_below == 0 {
                continue;
            }
            let mut rank = 0;
            for (prob, &h) in probs.iter_mut().zip(&heights) {
                if h < threshold {
                    *prob += mass * boltzmann_pmf(rank, self.config.boltzmann_parameter, n_below);
                    rank += 1;
                }
            }
        }

        let mut deepest = 0;
        for (k, &h) in heights.iter().enumerate() {
            if h < heights[deepest] {
                deepest = k;
            }
        }
        let n_above_deepest = self
            .thresholds
            .iter()
            .filter(|&&t| heights[deepest] >= t)
            .count();
        let uncovered: f64 = self.threshold_probs[..n_above_deepest].iter().sum();
        probs[deepest] += self.config.no_trough_prob * uncovered;

        let shifts = parabolic_shifts(yin);
        let bins_per_octave = 12.0 * self.bins_per_semitone as f64;
        let last_bin = (self.n_pitch_bins - 1) as f64;
        let mut candidates: Vec<PitchCandidate> = Vec::with_capacity(troughs.len());
        for (&i, &prob) in troughs.iter().zip(&probs) {
            if prob <= 0.0 {
                continue;
            }
            let period = (min_period + i) as f64 + shifts[i];
            let f0 = sr / period;
            let bin = (bins_per_octave * (f0 / self.fmin).log2())
                .round()
                .clamp(0.0, last_bin) as usize;

            match candidates.iter_mut().find(|c| c.bin == bin) {
                Some(c) => {
                    c.probability += prob;
                    if prob > c.strongest {
                        c.strongest = prob;
                        c.frequency = f0;
                    }
                }
                None => candidates.push(PitchCandidate {
                    bin,
                    probability: prob,
                    frequency: f0,
                    strongest: prob,
                }),
            }
        }

        let voiced_probability = candidates
            .iter()
            .map(|c| c.probability)
            .sum::<f64>()
            .clamp(0.0, 1.0);
        FrameObservation {
            candidates,
            voiced_probability,
        }
    }
}

/// Zero pads by `frame_length / 2` on both sides so frames are centred on hops.
fn center_pad(samples: &[f32], frame_length: usize) -> Vec<f64> {
    let pad = frame_length / 2;
    let mut padded = vec![0.0; samples.len() + 2 * pad];
    for (slot, &s) in padded[pad..].iter_mut().zip(samples) {
        *slot = s as f64;
    }
    padded
}

/// YIN's cumulative mean normalized difference for periods
/// `min_period..=max_period`; index 0 of the result is `min_period`.
///
/// The difference function is `d(tau) = sum_{j < W} (x[j] - x[j + tau])^2`, expanded
/// into window energies and an autocorrelation so it can be computed with FFTs.
fn cumulative_mean_normalized_difference(
    frame: &[f64],
    acf: &WindowedAutocorrelation,
    win_length: usize,
    min_period: usize,
    max_period: usize,
) -> Vec<f64> {
    let floor = |v: f64| if v.abs() < ZERO_FLOOR { 0.0 } else { v };

    let mut energy_prefix = Vec::with_capacity(frame.len() + 1);
    energy_prefix.push(0.0);
    let mut running = 0.0;
    for &s in frame {
        running += s * s;
        energy_prefix.push(running);
    }
    let energy = |tau: usize| floor(energy_prefix[tau + win_length] - energy_prefix[tau]);

    let r = acf.compute(frame, max_period);
    let e0 = energy(0);
    let diff: Vec<f64> = (0..=max_period)
        .map(|tau| e0 + energy(tau) - 2.0 * floor(r[tau]))
        .collect();

    let tiny = f64::MIN_POSITIVE;
    let mut cumulative = 0.0;
    let mut cmndf = Vec::with_capacity(max_period - min_period + 1);
    for tau in 1..=max_period {
        cumulative += diff[tau];
        if tau >= min_period {
            let mean = cumulative / tau as f64;
            cmndf.push(diff[tau] / (mean + tiny));
        }
    }
    cmndf
}

/// Sub-sample offset of the parabola through each point and its neighbours.
///
/// Offsets larger than one sample are unreliable and reported as zero, as are the
/// two end points.
fn parabolic_shifts(y: &[f64]) -> Vec<f64> {
    let tiny = f64::MIN_POSITIVE;
    let mut shifts = vec![0.0; y.len()];
    for i in 1..y.len().saturating_sub(1) {
        let a = (y[i - 1] + y[i + 1] - 2.0 * y[i]) / 2.0;
        let b = (y[i + 1] - y[i - 1]) / 2.0;
        let shift = -b / (2.0 * a + tiny);
        if shift.is_finite() && shift.abs() <= 1.0 {
            shifts[i] = shift;
        }
    }
    shifts
}

/// Indices of local minima. The first point counts if it is below its neighbour,
/// the last one if it is below its predecessor.
fn find_troughs(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    if n < 2 {
        return Vec::new();
    }
    let mut troughs = Vec::new();
    if y[0] < y[1] {
        troughs.push(0);
    }
    for i in 1..n - 1 {
        if y[i] < y[i - 1] && y[i] <= y[i + 1] {
            troughs.push(i);
        }
    }
    if y[n - 1] < y[n - 2] {
        troughs.push(n - 1);
    }
    troughs
}
