//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-based lagged products for the YIN difference function. Computing the
//! autocorrelation in the frequency domain turns the O(W * tau) inner loop of the
//! difference function into two forward transforms and one inverse per frame.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Plans reused across every frame of one recording.
pub struct WindowedAutocorrelation {
    fft_len: usize,
    win_length: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl WindowedAutocorrelation {
    /// Prepares transforms for frames of `frame_length` samples whose first
    /// `win_length` samples are correlated against the rest.
    pub fn new(frame_length: usize, win_length: usize) -> Self {
        let fft_len = frame_length.next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            fft_len,
            win_length,
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
        }
    }

    /// Returns `r[tau] = sum_{j < W} x[j] * x[j + tau]` for `tau` in `0..=max_lag`.
    ///
    /// `frame` must hold at least `win_length + max_lag` samples, so no lag reads
    /// past the end of the frame and the circular correlation never wraps.
    pub fn compute(&self, frame: &[f64], max_lag: usize) -> Vec<f64> {
        debug_assert!(frame.len() >= self.win_length + max_lag);
        debug_assert!(frame.len() <= self.fft_len);

        let mut whole = to_complex(frame, self.fft_len);
        let mut window = to_complex(&frame[..self.win_length], self.fft_len);

        self.forward.process(&mut whole);
        self.forward.process(&mut window);

        // Cross-correlation: multiply by the conjugate of the window spectrum.
        for (w, v) in whole.iter_mut().zip(window.iter()) {
            *w *= v.conj();
        }
        self.inverse.process(&mut whole);

        let scale = 1.0 / self.fft_len as f64;
        whole
            .iter()
            .take(max_lag + 1)
            .map(|c| c.re * scale)
            .collect()
    }
}

/// Zero-pads real samples into a complex buffer of length `len`.
fn to_complex(signal: &[f64], len: usize) -> Vec<Complex<f64>> {
    let mut buffer = vec![Complex { re: 0.0, im: 0.0 }; len];
    for (slot, &sample) in buffer.iter_mut().zip(signal) {
        slot.re = sample;
    }
    buffer
}
