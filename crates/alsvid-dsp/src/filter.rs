//! Pulse-shaping kernels and "same"-mode convolution.
//!
//! Kernels are built on the grid `t_k = (k - length/2) / rate`, so an
//! even `length` puts `t = 0` exactly on a sample. The apply functions
//! drop the leading tap, which turns the even-length kernel into an
//! odd, symmetric one centered on `t = 0`.

use std::f64::consts::{PI, SQRT_2};

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::error::{DspError, DspResult};

/// Root-raised-cosine taps (unnormalized, peak `1 - b + 4b/pi` at 0).
pub fn rrc_kernel(length: usize, roll_off: f64, symbol_period: f64, rate: f64) -> Vec<f64> {
    let half = length as f64 / 2.0;
    (0..length)
        .map(|k| rrc_tap((k as f64 - half) / rate, roll_off, symbol_period))
        .collect()
}

fn rrc_tap(t: f64, roll_off: f64, period: f64) -> f64 {
    if t == 0.0 {
        return 1.0 - roll_off + 4.0 * roll_off / PI;
    }
    if roll_off > 0.0 {
        // The general expression is 0/0 exactly at t = +-T/(4b).
        let singular = period / (4.0 * roll_off);
        if t == singular || t == -singular {
            let a = PI / (4.0 * roll_off);
            return (roll_off / SQRT_2)
                * ((1.0 + 2.0 / PI) * a.sin() + (1.0 - 2.0 / PI) * a.cos());
        }
    }
    let x = t / period;
    ((PI * x * (1.0 - roll_off)).sin() + 4.0 * roll_off * x * (PI * x * (1.0 + roll_off)).cos())
        / (PI * x * (1.0 - (4.0 * roll_off * x).powi(2)))
}

/// Rectangular taps: 1 where `|t| <= width / 2`, 0 elsewhere.
pub fn rect_kernel(length: usize, width: f64, rate: f64) -> Vec<f64> {
    let half = length as f64 / 2.0;
    (0..length)
        .map(|k| {
            let t = (k as f64 - half) / rate;
            if t.abs() <= width / 2.0 { 1.0 } else { 0.0 }
        })
        .collect()
}

/// Linear convolution truncated to the input length, centered
/// (the classic "same" mode), computed by FFT.
pub fn convolve_same(sequence: &[Complex64], kernel: &[f64]) -> Vec<Complex64> {
    if sequence.is_empty() || kernel.is_empty() {
        return sequence.to_vec();
    }
    let full = sequence.len() + kernel.len() - 1;
    let size = full.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(size);
    let ifft = planner.plan_fft_inverse(size);

    let mut a: Vec<Complex64> = Vec::with_capacity(size);
    a.extend_from_slice(sequence);
    a.resize(size, Complex64::new(0.0, 0.0));

    let mut b: Vec<Complex64> = kernel.iter().map(|&k| Complex64::new(k, 0.0)).collect();
    b.resize(size, Complex64::new(0.0, 0.0));

    fft.process(&mut a);
    fft.process(&mut b);
    for (x, y) in a.iter_mut().zip(&b) {
        *x *= *y;
    }
    ifft.process(&mut a);

    let scale = 1.0 / size as f64;
    let start = (kernel.len() - 1) / 2;
    a[start..start + sequence.len()]
        .iter()
        .map(|&v| v * scale)
        .collect()
}

/// Shape a sequence with the root-raised-cosine filter.
///
/// The kernel's leading tap is dropped before convolving and the
/// result is scaled by `1 / sqrt(symbol_period * rate)` so symbol
/// energy is independent of the oversampling factor.
pub fn apply_rrc_filter(
    sequence: &[Complex64],
    length: usize,
    roll_off: f64,
    symbol_period: f64,
    rate: f64,
) -> DspResult<Vec<Complex64>> {
    if !(0.0..=1.0).contains(&roll_off) {
        return Err(DspError::InvalidFilter(format!(
            "roll-off must lie in [0, 1], got {roll_off}"
        )));
    }
    if length < 2 {
        return Err(DspError::InvalidFilter(format!(
            "kernel length must be at least 2, got {length}"
        )));
    }
    let kernel = rrc_kernel(length, roll_off, symbol_period, rate);
    let norm = (symbol_period * rate).sqrt();
    Ok(convolve_same(sequence, &kernel[1..])
        .into_iter()
        .map(|v| v / norm)
        .collect())
}

/// Shape a sequence with a rectangular (pulsed) filter of temporal
/// width `cyclic_ratio * symbol_period`. No energy normalization.
pub fn apply_rect_filter(
    sequence: &[Complex64],
    length: usize,
    cyclic_ratio: f64,
    symbol_period: f64,
    rate: f64,
) -> DspResult<Vec<Complex64>> {
    if !(0.0..=1.0).contains(&cyclic_ratio) {
        return Err(DspError::InvalidFilter(format!(
            "cyclic ratio must lie in [0, 1], got {cyclic_ratio}"
        )));
    }
    if length < 2 {
        return Err(DspError::InvalidFilter(format!(
            "kernel length must be at least 2, got {length}"
        )));
    }
    let kernel = rect_kernel(length, cyclic_ratio * symbol_period, rate);
    Ok(convolve_same(sequence, &kernel[1..]))
}
