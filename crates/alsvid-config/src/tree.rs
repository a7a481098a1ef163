//! The configuration tree.
//!
//! One TOML document describes the whole transmitter: identity,
//! network endpoint, bench devices, frame composition and signal
//! persistence. The tree deserializes with serde; three sections are
//! required (`[authentication]`, `[transmitter]`, `[frame]`) and their
//! absence is reported as [`ConfigError::MissingSection`] rather than a
//! generic parse failure.

use std::str::FromStr;

use alsvid_dsp::{ModulationScheme, SignalFiles, SynthesisConfig};
use alsvid_hal::{DeviceConfig, EmissionParams, RepeatMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};

/// Sections that must be present in every document.
const REQUIRED_SECTIONS: [&str; 3] = ["authentication", "transmitter", "frame"];

/// Root of the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identity announced during identification.
    pub serial_number: String,
    /// Control channel endpoint.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Channel authentication.
    pub authentication: AuthenticationConfig,
    /// Bench devices and optical constants.
    pub transmitter: TransmitterConfig,
    /// Frame composition.
    pub frame: FrameConfig,
    /// Signal persistence switches.
    #[serde(default)]
    pub signal: SignalConfig,
}

/// `[network]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

/// `[authentication]`
///
/// Only the `none` scheme is implemented; the field exists so a
/// document written for an authenticating deployment fails loudly here
/// instead of silently running unauthenticated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// `[transmitter]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmitterConfig {
    /// Laser emission wavelength in meters.
    pub emission_wavelength: f64,
    /// Power meter calibration factor between the monitoring tap and
    /// the channel input.
    pub photodiode_conversion: f64,
    /// Deliberate extra modulation noise, as a fraction of shot noise.
    #[serde(default)]
    pub artificial_excess_noise: f64,
    pub dac: DacConfig,
    pub powermeter: PowerMeterConfig,
    pub voa: VoaConfig,
    pub laser: LaserConfig,
    pub bias_controller: BiasControllerConfig,
    #[serde(default)]
    pub polarization_recovery: PolarizationRecoveryConfig,
}

/// `[transmitter.dac]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DacConfig {
    /// Registered driver kind.
    pub kind: String,
    /// Driver-interpreted address.
    pub location: String,
    /// Output channels carrying I and Q.
    pub channels: Vec<u32>,
    /// Sample rate in Hz.
    pub rate: f64,
    /// Full-scale amplitude in volts.
    pub amplitude: f64,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// `[transmitter.powermeter]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerMeterConfig {
    pub kind: String,
    pub location: String,
    /// Budget for a single power read.
    pub timeout_secs: f64,
}

/// `[transmitter.voa]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoaConfig {
    pub kind: String,
    pub location: String,
    /// Applied attenuation value, driver units.
    pub value: f64,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// `[transmitter.laser]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserConfig {
    pub kind: String,
    pub location: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// `[transmitter.bias_controller]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasControllerConfig {
    pub kind: String,
    pub location: String,
    /// Lock-point parameters handed to the controller.
    #[serde(default)]
    pub lock: Map<String, Value>,
}

/// `[transmitter.polarization_recovery]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarizationRecoveryConfig {
    /// Tone frequency in Hz.
    #[serde(default = "default_recovery_frequency")]
    pub frequency: f64,
    /// Tone amplitude, normalized.
    #[serde(default = "default_recovery_amplitude")]
    pub amplitude: f64,
}

/// `[frame]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    #[serde(default)]
    pub num_zeros_start: usize,
    #[serde(default)]
    pub num_zeros_end: usize,
    pub quantum: QuantumConfig,
    #[serde(default)]
    pub pilots: PilotsConfig,
    pub zadoff_chu: ZadoffChuConfig,
}

/// `[frame.quantum]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumConfig {
    pub modulation: ModulationScheme,
    /// Total modulation variance, shot-noise units.
    pub variance: f64,
    #[serde(default = "default_modulation_size")]
    pub modulation_size: u32,
    pub num_symbols: usize,
    /// Symbol rate in Hz.
    pub symbol_rate: f64,
    /// Pulse-shaping roll-off, or the duty ratio in pulsed mode.
    pub roll_off: f64,
    /// Quantum band center offset in Hz.
    pub frequency_shift: f64,
    #[serde(default)]
    pub pulsed: bool,
}

/// `[frame.pilots]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PilotsConfig {
    #[serde(default)]
    pub frequencies: Vec<f64>,
    #[serde(default)]
    pub amplitudes: Vec<f64>,
}

/// `[frame.zadoff_chu]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZadoffChuConfig {
    pub root: u32,
    pub length: u32,
    /// Preamble rate in Hz; 0 plays at the converter rate.
    #[serde(default)]
    pub rate: f64,
}

/// `[signal]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(flatten)]
    pub files: SignalFiles,
    /// Fixed seed for the symbol draw; absent means OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    8100
}

fn default_recovery_frequency() -> f64 {
    1e6
}

fn default_recovery_amplitude() -> f64 {
    0.25
}

fn default_modulation_size() -> u32 {
    4
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
        }
    }
}

impl Default for PolarizationRecoveryConfig {
    fn default() -> Self {
        Self {
            frequency: default_recovery_frequency(),
            amplitude: default_recovery_amplitude(),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    /// Parse a TOML document, checking required sections and the
    /// authentication scheme.
    fn from_str(text: &str) -> ConfigResult<Self> {
        let document: toml::Value = toml::from_str(text)?;
        for section in REQUIRED_SECTIONS {
            if document.get(section).is_none() {
                return Err(ConfigError::MissingSection(section));
            }
        }
        let config: Config = document.try_into()?;
        if config.authentication.scheme != "none" {
            return Err(ConfigError::UnsupportedScheme(
                config.authentication.scheme.clone(),
            ));
        }
        Ok(config)
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &std::path::Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config = text.parse::<Self>()?;
        info!(path = %path.display(), serial = %config.serial_number, "configuration loaded");
        Ok(config)
    }

    /// Assemble the synthesis input from the frame, signal and
    /// converter sections.
    pub fn synthesis(&self) -> SynthesisConfig {
        SynthesisConfig {
            modulation: self.frame.quantum.modulation,
            variance: self.frame.quantum.variance,
            modulation_size: self.frame.quantum.modulation_size,
            num_symbols: self.frame.quantum.num_symbols,
            symbol_rate: self.frame.quantum.symbol_rate,
            roll_off: self.frame.quantum.roll_off,
            frequency_shift: self.frame.quantum.frequency_shift,
            pilot_frequencies: self.frame.pilots.frequencies.clone(),
            pilot_amplitudes: self.frame.pilots.amplitudes.clone(),
            zc_root: self.frame.zadoff_chu.root,
            zc_length: self.frame.zadoff_chu.length,
            zc_rate: self.frame.zadoff_chu.rate,
            num_zeros_start: self.frame.num_zeros_start,
            num_zeros_end: self.frame.num_zeros_end,
            dac_rate: self.transmitter.dac.rate,
            pulsed: self.frame.quantum.pulsed,
            files: self.signal.files.clone(),
            seed: self.signal.seed,
        }
    }
}

impl DacConfig {
    /// Factory input for the converter driver.
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            location: self.location.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Emission parameters for one playback mode.
    pub fn emission_params(&self, mode: RepeatMode) -> EmissionParams {
        EmissionParams {
            channels: self.channels.clone(),
            rate: self.rate,
            amplitude: self.amplitude,
            mode,
            extra: self.extra.clone(),
        }
    }
}

impl PowerMeterConfig {
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig::new(&self.location)
    }
}

impl VoaConfig {
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            location: self.location.clone(),
            extra: self.extra.clone(),
        }
    }
}

impl LaserConfig {
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig::new(&self.location)
    }
}

impl BiasControllerConfig {
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig::new(&self.location)
    }
}
