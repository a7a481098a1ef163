//! Polarization recovery.
//!
//! The receiver aligns its polarization controller against a plain
//! sinusoid, so for the duration of the procedure the converter emits a
//! looping single tone instead of frame data. Ending the procedure
//! stops the tone and puts the converter back into its normal emission
//! configuration.

use num_complex::Complex64;
use tracing::info;

use alsvid_config::{DacConfig, PolarizationRecoveryConfig};
use alsvid_dsp::sequence::tone;
use alsvid_hal::{RepeatMode, TransmitConverter};

use crate::error::ServerResult;

/// Samples of the tone loaded into the converter; looped, so the exact
/// count only matters for the frequency resolution of the loop seam.
pub const TONE_SAMPLES: usize = 100_000;

/// Load and start the recovery tone.
pub async fn start_recovery(
    dac: &mut dyn TransmitConverter,
    dac_config: &DacConfig,
    recovery: &PolarizationRecoveryConfig,
) -> ServerResult<()> {
    info!(
        frequency = recovery.frequency,
        amplitude = recovery.amplitude,
        "starting polarization-recovery tone"
    );
    dac.configure(&dac_config.emission_params(RepeatMode::Continuous))
        .await?;
    let samples: Vec<Complex64> = tone(
        recovery.frequency,
        recovery.amplitude,
        TONE_SAMPLES,
        dac_config.rate,
    );
    let i: Vec<f64> = samples.iter().map(|s| s.re).collect();
    let q: Vec<f64> = samples.iter().map(|s| s.im).collect();
    dac.load(&i, &q).await?;
    dac.start().await?;
    Ok(())
}

/// Stop the tone and restore the normal emission configuration.
pub async fn end_recovery(dac: &mut dyn TransmitConverter, dac_config: &DacConfig) -> ServerResult<()> {
    dac.stop().await?;
    dac.configure(&dac_config.emission_params(RepeatMode::Continuous))
        .await?;
    info!("polarization-recovery tone stopped");
    Ok(())
}
