//! One-sided magnitude spectrum of a sampled time series.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// A single frequency bin in a one-sided magnitude spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyBin {
    /// Bin center frequency in Hz.
    pub frequency: f64,
    /// Raw transform magnitude at this bin.
    pub magnitude: f64,
}

/// Compute the one-sided magnitude spectrum of `series`.
///
/// `interval_s` is the fixed spacing between consecutive samples; it sets
/// the frequency resolution to `1 / (n * interval_s)`. The returned bins
/// cover the non-negative half of the transform (`n / 2` bins), which is
/// sufficient for a real-valued input signal.
pub fn one_sided_spectrum(series: &[f64], interval_s: f64) -> Vec<FrequencyBin> {
    let n = series.len();
    if n == 0 || interval_s <= 0.0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = series.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let resolution = 1.0 / (n as f64 * interval_s);
    buffer
        .iter()
        .take(n / 2)
        .enumerate()
        .map(|(i, value)| FrequencyBin {
            frequency: i as f64 * resolution,
            magnitude: value.norm(),
        })
        .collect()
}
