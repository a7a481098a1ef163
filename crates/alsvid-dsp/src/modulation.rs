//! Modulation families for the quantum symbols.
//!
//! All families are parameterized by the total variance of the complex
//! symbol, `E[|z|^2]`, so swapping families keeps the emitted power
//! comparable.

use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{DspError, DspResult};

/// Modulation family used to draw a frame's symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModulationScheme {
    /// Both quadratures i.i.d. centered normal with variance `V/2`.
    Gaussian,
    /// `modulation_size` points uniformly on a circle of radius `sqrt(V)`.
    Psk,
    /// Square grid of `modulation_size` points, power-normalized to `V`.
    Qam,
}

impl ModulationScheme {
    /// Stable lowercase name (used in logs and configuration).
    pub fn name(&self) -> &'static str {
        match self {
            ModulationScheme::Gaussian => "gaussian",
            ModulationScheme::Psk => "psk",
            ModulationScheme::Qam => "qam",
        }
    }

    /// Draw `count` symbols at total variance `variance`.
    ///
    /// `modulation_size` must be a power of two of at least 2 for the
    /// discrete families, and additionally a perfect square for QAM.
    /// It is ignored for Gaussian.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        variance: f64,
        modulation_size: u32,
        count: usize,
        rng: &mut R,
    ) -> DspResult<Vec<Complex64>> {
        if !(variance > 0.0) {
            return Err(DspError::InvalidModulation(format!(
                "variance must be positive, got {variance}"
            )));
        }
        match self {
            ModulationScheme::Gaussian => {
                let sigma = (variance / 2.0).sqrt();
                let normal = Normal::new(0.0, sigma)
                    .map_err(|err| DspError::InvalidModulation(err.to_string()))?;
                Ok((0..count)
                    .map(|_| Complex64::new(normal.sample(rng), normal.sample(rng)))
                    .collect())
            }
            ModulationScheme::Psk => {
                check_discrete_size(modulation_size)?;
                let radius = variance.sqrt();
                let m = modulation_size as usize;
                let step = std::f64::consts::TAU / m as f64;
                Ok((0..count)
                    .map(|_| {
                        let k = rng.gen_range(0..m);
                        Complex64::from_polar(radius, step * k as f64)
                    })
                    .collect())
            }
            ModulationScheme::Qam => {
                check_discrete_size(modulation_size)?;
                let side = (modulation_size as f64).sqrt().round() as u32;
                if side * side != modulation_size {
                    return Err(DspError::InvalidModulation(format!(
                        "QAM size must be a perfect square, got {modulation_size}"
                    )));
                }
                // Levels +-1, +-3, ... +-(side-1), scaled so that the
                // uniform draw has total variance `variance`.
                let per_axis = (side as f64 * side as f64 - 1.0) / 3.0;
                let scale = (variance / (2.0 * per_axis)).sqrt();
                let side = side as i64;
                Ok((0..count)
                    .map(|_| {
                        let i = rng.gen_range(0..side);
                        let q = rng.gen_range(0..side);
                        Complex64::new(
                            scale * (2 * i + 1 - side) as f64,
                            scale * (2 * q + 1 - side) as f64,
                        )
                    })
                    .collect())
            }
        }
    }
}

fn check_discrete_size(size: u32) -> DspResult<()> {
    if size < 2 || !size.is_power_of_two() {
        return Err(DspError::InvalidModulation(format!(
            "modulation size must be a power of two of at least 2, got {size}"
        )));
    }
    Ok(())
}
