//! Photon-number calibration.
//!
//! After an acquisition the engine measures the mean photon number per
//! symbol actually leaving the transmitter: the monitoring power meter
//! is read with the converter idle and again while it replays the
//! frame's quantum-only sequence, and the power difference is converted
//! through the photon energy at the emission wavelength.
//!
//! The procedure is blocking and time-bounded; no protocol command is
//! processed while it runs. The converter is put into single-shot
//! playback for the illumination and restored to its normal repeating
//! mode on every exit path.

use std::time::Duration;

use num_complex::Complex64;
use tokio::time::sleep;
use tracing::{debug, info};

use alsvid_config::DacConfig;
use alsvid_hal::{PowerMeter, RepeatMode, TransmitConverter};

use crate::error::{ServerError, ServerResult};

/// Readings averaged per phase (idle and illuminated).
pub const POWER_READS: usize = 20;
/// Delay between two readings.
pub const READ_INTERVAL: Duration = Duration::from_millis(100);
/// Delay between starting playback and the first illuminated reading.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

const PLANCK_CONSTANT: f64 = 6.626_070_15e-34;
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Energy of one photon at `wavelength` (meters), in joules.
pub fn photon_energy(wavelength: f64) -> f64 {
    PLANCK_CONSTANT * SPEED_OF_LIGHT / wavelength
}

/// Measure the mean photon number per symbol at the channel input.
///
/// `photodiode_conversion` maps the power seen on the monitoring tap to
/// the power at the channel input. The caller decides what to do with a
/// failure; the converter's repeating mode is restored either way.
pub async fn measure_photon_number(
    dac: &mut dyn TransmitConverter,
    meter: &mut dyn PowerMeter,
    dac_config: &DacConfig,
    quantum_sequence: &[Complex64],
    symbol_rate: f64,
    wavelength: f64,
    photodiode_conversion: f64,
) -> ServerResult<f64> {
    if quantum_sequence.is_empty() {
        return Err(ServerError::Calibration(
            "no quantum sequence to calibrate against".into(),
        ));
    }

    dac.configure(&dac_config.emission_params(RepeatMode::Single))
        .await?;
    let outcome = measure_powers(dac, meter, quantum_sequence).await;
    // Repeating playback comes back whatever happened above.
    let restore = dac
        .configure(&dac_config.emission_params(RepeatMode::Continuous))
        .await;
    let (baseline, illuminated) = outcome?;
    restore?;

    let photon_number =
        (illuminated - baseline) / (symbol_rate * photon_energy(wavelength)) * photodiode_conversion;
    info!(
        baseline_watts = baseline,
        illuminated_watts = illuminated,
        photon_number,
        "photon-number calibration complete"
    );
    Ok(photon_number)
}

async fn measure_powers(
    dac: &mut dyn TransmitConverter,
    meter: &mut dyn PowerMeter,
    quantum_sequence: &[Complex64],
) -> ServerResult<(f64, f64)> {
    let baseline = average_power(meter).await?;
    debug!(baseline_watts = baseline, "idle power measured");

    let i: Vec<f64> = quantum_sequence.iter().map(|s| s.re).collect();
    let q: Vec<f64> = quantum_sequence.iter().map(|s| s.im).collect();
    dac.load(&i, &q).await?;
    dac.start().await?;
    sleep(SETTLE_DELAY).await;
    let reading = average_power(meter).await;
    let stopped = dac.stop().await;
    let illuminated = reading?;
    stopped?;
    debug!(illuminated_watts = illuminated, "illuminated power measured");

    Ok((baseline, illuminated))
}

async fn average_power(meter: &mut dyn PowerMeter) -> ServerResult<f64> {
    let mut total = 0.0;
    for n in 0..POWER_READS {
        if n > 0 {
            sleep(READ_INTERVAL).await;
        }
        total += meter.read().await?;
    }
    Ok(total / POWER_READS as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use alsvid_adapter_sim::{ConverterEvent, SimConverter, SimPowerMeter};
    use alsvid_hal::HalError;

    fn dac_config() -> DacConfig {
        DacConfig {
            kind: "sim".into(),
            location: "dac0".into(),
            channels: vec![1, 2],
            rate: 500e6,
            amplitude: 0.5,
            extra: serde_json::Map::new(),
        }
    }

    fn quantum(count: usize) -> Vec<Complex64> {
        (0..count)
            .map(|n| Complex64::new(0.1, -0.05) * n as f64 / count as f64)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_photon_number_arithmetic() {
        let mut dac = SimConverter::new();
        let probe = dac.probe();
        let mut meter = SimPowerMeter::new()
            .with_dark_power(2e-9)
            .with_emission_power(4e-6)
            .linked_to(dac.probe());
        dac.open().await.unwrap();
        meter.open().await.unwrap();

        let symbol_rate = 100e6;
        let wavelength = 1550e-9;
        let n = measure_photon_number(
            &mut dac,
            &mut meter,
            &dac_config(),
            &quantum(64),
            symbol_rate,
            wavelength,
            0.8,
        )
        .await
        .unwrap();

        let expected = 4e-6 / (symbol_rate * photon_energy(wavelength)) * 0.8;
        assert!((n - expected).abs() / expected < 1e-9, "{n} vs {expected}");
        // Repeating mode restored, playback stopped.
        assert_eq!(probe.mode(), Some(RepeatMode::Continuous));
        assert!(!probe.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_restored_after_meter_fault() {
        let mut dac = SimConverter::new();
        let probe = dac.probe();
        let mut meter = SimPowerMeter::new().with_dark_power(1e-9).fail_after(5);
        dac.open().await.unwrap();
        meter.open().await.unwrap();

        let result = measure_photon_number(
            &mut dac,
            &mut meter,
            &dac_config(),
            &quantum(16),
            100e6,
            1550e-9,
            1.0,
        )
        .await;
        assert!(matches!(result, Err(ServerError::Device(HalError::Device(_)))));

        let events = probe.events();
        assert_eq!(
            events.last(),
            Some(&ConverterEvent::Configured(RepeatMode::Continuous))
        );
        assert!(!probe.is_playing());
    }

    #[tokio::test]
    async fn test_empty_sequence_rejected() {
        let mut dac = SimConverter::new();
        let mut meter = SimPowerMeter::new();
        dac.open().await.unwrap();
        meter.open().await.unwrap();
        let result = measure_photon_number(
            &mut dac,
            &mut meter,
            &dac_config(),
            &[],
            100e6,
            1550e-9,
            1.0,
        )
        .await;
        assert!(matches!(result, Err(ServerError::Calibration(_))));
    }

    #[test]
    fn test_photon_energy_at_telecom_wavelength() {
        let energy = photon_energy(1550e-9);
        assert!((energy - 1.28e-19).abs() < 1e-21);
    }
}
