//! Probability distributions used as priors by the pitch tracker.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for `x > 0` (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut sum = LANCZOS_COEFFS[0];
        for (i, &c) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
            sum += c / (x + i as f64);
        }
        let t = x + LANCZOS_G + 0.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
    }
}

/// Cumulative distribution function of Beta(`a`, `b`) at `x`.
///
/// This is the regularized incomplete beta function, evaluated with Lentz's
/// continued fraction on whichever side of the mean converges faster.
pub fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITERATIONS: usize = 300;
    const EPSILON: f64 = 1e-15;
    const FLOOR: f64 = 1e-300;

    let clamp = |v: f64| if v.abs() < FLOOR { FLOOR } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp(1.0 + aa * d);
        c = clamp(1.0 + aa / c);
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp(1.0 + aa * d);
        c = clamp(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}

/// Probability that each of `thresholds.len() - 1` consecutive intervals holds a
/// Beta(`a`, `b`) variable; `thresholds` must be increasing.
pub fn beta_interval_probs(thresholds: &[f64], a: f64, b: f64) -> Vec<f64> {
    let cdf: Vec<f64> = thresholds.iter().map(|&t| beta_cdf(t, a, b)).collect();
    cdf.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect()
}

/// Truncated Boltzmann (discrete exponential) probability of index `k` among `n`.
///
/// `P(k) = (1 - e^-lambda) / (1 - e^(-lambda n)) * e^(-lambda k)` for `k < n`.
pub fn boltzmann_pmf(k: usize, lambda: f64, n: usize) -> f64 {
    if k >= n {
        return 0.0;
    }
    let norm = (1.0 - (-lambda).exp()) / (1.0 - (-lambda * n as f64).exp());
    norm * (-lambda * k as f64).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma_factorials() {
        // Gamma(n) = (n - 1)!
        let expected = [1.0_f64, 1.0, 2.0, 6.0, 24.0, 120.0];
        for (i, &f) in expected.iter().enumerate() {
            let n = (i + 1) as f64;
            assert!((ln_gamma(n) - f.ln()).abs() < 1e-10, "n = {n}");
        }
        // Gamma(1/2) = sqrt(pi)
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-10);
        assert!((ln_gamma(0.25) - 3.625_609_908_221_908_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_beta_cdf_closed_form() {
        // For a = 2: I_x(2, b) = 1 - (1 - x)^b (1 + b x)
        let b = 18.0;
        for &x in &[0.01, 0.05, 0.1, 0.2, 0.35, 0.5, 0.8, 0.99] {
            let expected = 1.0 - (1.0_f64 - x).powf(b) * (1.0 + b * x);
            let got = beta_cdf(x, 2.0, b);
            assert!((got - expected).abs() < 1e-10, "x = {x}: {got} vs {expected}");
        }
    }

    #[test]
    fn test_uniform_beta() {
        for &x in &[0.1, 0.3, 0.7] {
            assert!((beta_cdf(x, 1.0, 1.0) - x).abs() < 1e-12);
        }
        assert_eq!(beta_cdf(0.0, 2.0, 18.0), 0.0);
        assert_eq!(beta_cdf(1.0, 2.0, 18.0), 1.0);
    }

    #[test]
    fn test_interval_probs_sum_to_one() {
        let thresholds: Vec<f64> = (0..=100).map(|i| i as f64 / 100.0).collect();
        let probs = beta_interval_probs(&thresholds, 2.0, 18.0);
        assert_eq!(probs.len(), 100);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_boltzmann_normalized_and_decreasing() {
        for n in 1..6 {
            let total: f64 = (0..n).map(|k| boltzmann_pmf(k, 2.0, n)).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
        assert!(boltzmann_pmf(0, 2.0, 3) > boltzmann_pmf(1, 2.0, 3));
        assert_eq!(boltzmann_pmf(3, 2.0, 3), 0.0);
        assert_eq!(boltzmann_pmf(0, 2.0, 1), 1.0);
    }
}
