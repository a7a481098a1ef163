//! Sample-domain sequence operations.

use num_complex::Complex64;

use crate::error::{DspError, DspResult};

/// Insert each symbol on a zero grid, `ratio` samples per symbol.
///
/// Symbol `i` lands at position `i * ratio + ratio / 2`; every other
/// sample is zero. `ratio` must be at least 1.
pub fn upsample(sequence: &[Complex64], ratio: usize) -> Vec<Complex64> {
    debug_assert!(ratio >= 1);
    let mut upsampled = vec![Complex64::new(0.0, 0.0); sequence.len() * ratio];
    let offset = ratio / 2;
    for (i, &symbol) in sequence.iter().enumerate() {
        upsampled[i * ratio + offset] = symbol;
    }
    upsampled
}

/// Multiply sample `n` by `exp(j 2 pi f n / rate)`, moving the
/// baseband spectrum up by `frequency` Hz.
pub fn shift_frequency(sequence: &[Complex64], frequency: f64, rate: f64) -> Vec<Complex64> {
    let step = std::f64::consts::TAU * frequency / rate;
    sequence
        .iter()
        .enumerate()
        .map(|(n, &sample)| sample * Complex64::from_polar(1.0, step * n as f64))
        .collect()
}

/// A complex exponential `a exp(j 2 pi f n / rate)` of `count` samples.
pub fn tone(frequency: f64, amplitude: f64, count: usize, rate: f64) -> Vec<Complex64> {
    let step = std::f64::consts::TAU * frequency / rate;
    (0..count)
        .map(|n| Complex64::from_polar(amplitude, step * n as f64))
        .collect()
}

/// Superpose one complex exponential per `(frequency, amplitude)` pair
/// onto the sequence.
pub fn add_pilots(
    sequence: &[Complex64],
    frequencies: &[f64],
    amplitudes: &[f64],
    rate: f64,
) -> DspResult<Vec<Complex64>> {
    if frequencies.len() != amplitudes.len() {
        return Err(DspError::PilotMismatch {
            frequencies: frequencies.len(),
            amplitudes: amplitudes.len(),
        });
    }
    let mut pilots = vec![Complex64::new(0.0, 0.0); sequence.len()];
    for (&frequency, &amplitude) in frequencies.iter().zip(amplitudes) {
        let step = std::f64::consts::TAU * frequency / rate;
        for (n, sample) in pilots.iter_mut().enumerate() {
            *sample += Complex64::from_polar(amplitude, step * n as f64);
        }
    }
    Ok(sequence
        .iter()
        .zip(&pilots)
        .map(|(&signal, &pilot)| signal + pilot)
        .collect())
}

/// Pad with `start` zeros in front and `end` zeros behind.
pub fn pad_zeros(sequence: &[Complex64], start: usize, end: usize) -> Vec<Complex64> {
    let mut padded = Vec::with_capacity(start + sequence.len() + end);
    padded.resize(start, Complex64::new(0.0, 0.0));
    padded.extend_from_slice(sequence);
    padded.resize(start + sequence.len() + end, Complex64::new(0.0, 0.0));
    padded
}
