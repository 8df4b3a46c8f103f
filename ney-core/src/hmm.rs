//! Viterbi smoothing of per-frame pitch observations.
//!
//! The hidden state is a pitch bin paired with a voicing flag, `2 * n_bins` states in
//! total. Pitch may only move within a triangular band per frame, and the voicing
//! flag flips with a fixed switch probability.

/// Largest state count the decoder supports; backpointers are stored as `u16`.
pub const MAX_STATES: usize = u16::MAX as usize + 1;

/// One decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchState {
    pub voiced: bool,
    /// Pitch bin index; meaningful for unvoiced frames only as the last position.
    pub bin: usize,
}

/// Transition model over voiced and unvoiced pitch bins.
#[derive(Debug, Clone)]
pub struct PitchHmm {
    n_bins: usize,
    half_width: usize,
    /// `ln` of the triangle weight at each bin distance `0..=half_width`.
    log_weights: Vec<f64>,
    /// `ln` of each source row's weight sum, so rows cut by the band edges still
    /// sum to one.
    log_row_norms: Vec<f64>,
    log_stay: f64,
    log_switch: f64,
}

impl PitchHmm {
    /// # Arguments
    /// * `n_bins` - Number of pitch bins
    /// * `transition_width` - Width in bins of the triangular pitch transition band
    /// * `switch_prob` - Probability of toggling voicing between frames
    pub fn new(n_bins: usize, transition_width: usize, switch_prob: f64) -> Self {
        let half_width = transition_width / 2;
        let weights: Vec<f64> = (0..=half_width)
            .map(|d| 1.0 - d as f64 / (half_width + 1) as f64)
            .collect();

        let log_row_norms = (0..n_bins)
            .map(|i| {
                let lo = i.saturating_sub(half_width);
                let hi = (i + half_width).min(n_bins.saturating_sub(1));
                (lo..=hi).map(|j| weights[i.abs_diff(j)]).sum::<f64>().ln()
            })
            .collect();

        Self {
            n_bins,
            half_width,
            log_weights: weights.iter().map(|w| w.ln()).collect(),
            log_row_norms,
            log_stay: (1.0 - switch_prob).ln(),
            log_switch: switch_prob.ln(),
        }
    }

    fn log_transition(&self, from_bin: usize, to_bin: usize) -> f64 {
        self.log_weights[from_bin.abs_diff(to_bin)] - self.log_row_norms[from_bin]
    }

    /// Most likely state sequence.
    ///
    /// # Arguments
    /// * `voiced_obs` - Per frame, `(bin, probability)` pairs for the voiced bins that
    ///   received mass; every other voiced bin has probability zero
    /// * `voiced_probs` - Per frame, the total voiced probability; the remainder is
    ///   spread evenly over the unvoiced states
    ///
    /// Decoding starts from the unvoiced states with a uniform pitch prior.
    pub fn decode(
        &self,
        voiced_obs: &[Vec<(usize, f64)>],
        voiced_probs: &[f64],
    ) -> Vec<PitchState> {
        let n = self.n_bins;
        let n_frames = voiced_obs.len().min(voiced_probs.len());
        if n_frames == 0 || n == 0 {
            return Vec::new();
        }
        let n_states = 2 * n;
        let tiny = f64::MIN_POSITIVE;

        let log_floor = tiny.ln();

        // Dense log observations of the current frame, rebuilt from the sparse input.
        let mut log_voiced = vec![log_floor; n];
        let fill = |log_voiced: &mut [f64], t: usize| {
            for &(bin, mass) in &voiced_obs[t] {
                if bin < n {
                    log_voiced[bin] = (mass + tiny).ln();
                }
            }
        };
        let log_unvoiced = |t: usize| ((1.0 - voiced_probs[t]) / n as f64 + tiny).ln();

        fill(&mut log_voiced, 0);
        let mut value: Vec<f64> = (0..n_states)
            .map(|s| {
                if s < n {
                    log_floor + log_voiced[s]
                } else {
                    (1.0 / n as f64 + tiny).ln() + log_unvoiced(0)
                }
            })
            .collect();
        let mut next = vec![f64::NEG_INFINITY; n_states];
        let mut backpointers = vec![0u16; n_frames * n_states];

        for t in 1..n_frames {
            for &(bin, _) in &voiced_obs[t - 1] {
                if bin < n {
                    log_voiced[bin] = log_floor;
                }
            }
            fill(&mut log_voiced, t);
            let log_unvoiced_t = log_unvoiced(t);

            for to_block in 0..2 {
                for to_bin in 0..n {
                    let lo = to_bin.saturating_sub(self.half_width);
                    let hi = (to_bin + self.half_width).min(n - 1);

                    let mut best = f64::NEG_INFINITY;
                    let mut best_from = 0;
                    for from_block in 0..2 {
                        let log_voicing = if from_block == to_block {
                            self.log_stay
                        } else {
                            self.log_switch
                        };
                        for from_bin in lo..=hi {
                            let from = from_block * n + from_bin;
                            let score =
                                value[from] + log_voicing + self.log_transition(from_bin, to_bin);
                            if score > best {
                                best = score;
                                best_from = from;
                            }
                        }
                    }

                    let to = to_block * n + to_bin;
                    let log_obs = if to_block == 0 {
                        log_voiced[to_bin]
                    } else {
                        log_unvoiced_t
                    };
                    next[to] = best + log_obs;
                    backpointers[t * n_states + to] = best_from as u16;
                }
            }
            std::mem::swap(&mut value, &mut next);
        }

        // First maximum wins ties.
        let mut state = 0;
        for (s, &v) in value.iter().enumerate() {
            if v > value[state] {
                state = s;
            }
        }

        let mut path = vec![0usize; n_frames];
        path[n_frames - 1] = state;
        for t in (1..n_frames).rev() {
            state = backpointers[t * n_states + state] as usize;
            path[t - 1] = state;
        }

        path.into_iter()
            .map(|s| PitchState {
                voiced: s < n,
                bin: s % n,
            })
            .collect()
    }
}
