//! Zadoff-Chu synchronization preamble.
//!
//! Constant-amplitude, zero-autocorrelation sequence prepended to every
//! frame so the receiver can find the frame start and correct the clock.

use num_complex::Complex64;

use crate::error::{DspError, DspResult};

/// Generate the Zadoff-Chu sequence of the given root and length:
/// `zc[n] = exp(-j pi u n (n + L mod 2) / L)`.
///
/// The root must be nonzero, smaller than the length, and coprime with
/// it; otherwise the sequence loses its correlation properties.
pub fn zadoff_chu(root: u32, length: u32) -> DspResult<Vec<Complex64>> {
    if length == 0 {
        return Err(DspError::InvalidPreamble("length must be positive".into()));
    }
    if root == 0 || root >= length {
        return Err(DspError::InvalidPreamble(format!(
            "root must lie in 1..{length}, got {root}"
        )));
    }
    if gcd(root, length) != 1 {
        return Err(DspError::InvalidPreamble(format!(
            "root {root} and length {length} must be coprime"
        )));
    }

    let cf = (length % 2) as f64;
    let l = length as f64;
    let u = root as f64;
    Ok((0..length)
        .map(|n| {
            let n = n as f64;
            Complex64::from_polar(1.0, -std::f64::consts::PI * u * n * (n + cf) / l)
        })
        .collect())
}

/// Prepend the preamble, each preamble sample repeated `repeat` times
/// (sample-and-hold to slow the preamble below the converter rate).
pub fn prepend_preamble(
    sequence: &[Complex64],
    preamble: &[Complex64],
    repeat: usize,
) -> Vec<Complex64> {
    debug_assert!(repeat >= 1);
    let mut framed = Vec::with_capacity(preamble.len() * repeat + sequence.len());
    for &sample in preamble {
        for _ in 0..repeat {
            framed.push(sample);
        }
    }
    framed.extend_from_slice(sequence);
    framed
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
