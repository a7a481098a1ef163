//! Device contracts for the transmitter bench.
//!
//! Five instrument roles make up the bench:
//!
//! | Trait | Instrument | Role |
//! |-------|-----------|------|
//! | [`TransmitConverter`] | arbitrary-waveform DAC | emits the modulated frame |
//! | [`PowerMeter`] | optical power meter | monitors a tapped fraction of the output |
//! | [`Attenuator`] | variable optical attenuator | sets the launch power |
//! | [`Laser`] | CW laser source | provides the carrier |
//! | [`BiasController`] | modulator bias controller | holds the IQ modulator at its operating point |
//!
//! # Contract
//!
//! - Every method is async and fallible; a driver maps its native
//!   failures onto [`HalError`](crate::error::HalError).
//! - Devices are exclusively owned: methods take `&mut self` and
//!   implementations need no internal locking.
//! - Lifecycle is `open()` first, `close()` last; any call on a device
//!   that is not open MUST fail with `HalError::NotOpen`. `close()` on
//!   a never-opened device is a no-op.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HalResult;

/// How the converter plays a loaded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// Play the sequence once per `start()`.
    Single,
    /// Loop the sequence until `stop()`.
    Continuous,
}

impl RepeatMode {
    /// Stable lowercase name (used in logs).
    pub fn name(&self) -> &'static str {
        match self {
            RepeatMode::Single => "single",
            RepeatMode::Continuous => "continuous",
        }
    }
}

/// Emission parameters applied by [`TransmitConverter::configure`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionParams {
    /// Output channels carrying the I and Q parts.
    pub channels: Vec<u32>,
    /// Sample rate in Hz.
    pub rate: f64,
    /// Full-scale output amplitude in volts.
    pub amplitude: f64,
    /// Playback mode.
    pub mode: RepeatMode,
    /// Driver-specific extras.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Configuration handed to a device factory.
///
/// `location` is the driver-interpreted address (VISA resource, IP,
/// serial port); `extra` carries driver-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Driver-interpreted device address.
    pub location: String,
    /// Driver-specific settings.
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceConfig {
    /// Create a configuration with just an address.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Add a driver-specific setting.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Arbitrary-waveform converter that turns I/Q samples into light.
#[async_trait]
pub trait TransmitConverter: Send {
    /// Driver name (used in logs).
    fn name(&self) -> &str;

    /// Acquire the instrument.
    async fn open(&mut self) -> HalResult<()>;

    /// Apply emission parameters. May be called repeatedly while open;
    /// the last call wins.
    async fn configure(&mut self, params: &EmissionParams) -> HalResult<()>;

    /// Load one sequence, in-phase and quadrature parts separately.
    /// Samples are normalized to [-1, 1]; scaling to volts is the
    /// driver's job. Replaces any previously loaded sequence.
    async fn load(&mut self, i: &[f64], q: &[f64]) -> HalResult<()>;

    /// Start playback of the loaded sequence.
    async fn start(&mut self) -> HalResult<()>;

    /// Stop playback.
    async fn stop(&mut self) -> HalResult<()>;

    /// Release the instrument.
    async fn close(&mut self) -> HalResult<()>;
}

/// Optical power meter on the monitoring tap.
#[async_trait]
pub trait PowerMeter: Send {
    /// Driver name (used in logs).
    fn name(&self) -> &str;

    /// Acquire the instrument.
    async fn open(&mut self) -> HalResult<()>;

    /// One power reading in watts.
    async fn read(&mut self) -> HalResult<f64>;

    /// Release the instrument.
    async fn close(&mut self) -> HalResult<()>;
}

/// Variable optical attenuator.
#[async_trait]
pub trait Attenuator: Send {
    /// Driver name (used in logs).
    fn name(&self) -> &str;

    /// Acquire the instrument.
    async fn open(&mut self) -> HalResult<()>;

    /// Apply an attenuation setting (driver units).
    async fn set(&mut self, value: f64) -> HalResult<()>;

    /// Release the instrument.
    async fn close(&mut self) -> HalResult<()>;
}

/// CW laser source.
#[async_trait]
pub trait Laser: Send {
    /// Driver name (used in logs).
    fn name(&self) -> &str;

    /// Acquire the instrument.
    async fn open(&mut self) -> HalResult<()>;

    /// Apply source parameters (power, frequency, ...).
    async fn configure(
        &mut self,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> HalResult<()>;

    /// Open the shutter / enable emission.
    async fn enable(&mut self) -> HalResult<()>;

    /// Close the shutter / disable emission.
    async fn disable(&mut self) -> HalResult<()>;

    /// Release the instrument.
    async fn close(&mut self) -> HalResult<()>;
}

/// IQ-modulator bias controller.
#[async_trait]
pub trait BiasController: Send {
    /// Driver name (used in logs).
    fn name(&self) -> &str;

    /// Acquire the instrument.
    async fn open(&mut self) -> HalResult<()>;

    /// Start the bias lock with the given settings.
    async fn lock(&mut self, params: &serde_json::Map<String, serde_json::Value>) -> HalResult<()>;

    /// Release the instrument.
    async fn close(&mut self) -> HalResult<()>;
}

/// The five instruments of one transmitter, boxed behind their
/// contracts. Construction is the registry's job; open/close ordering
/// is the caller's.
pub struct Bench {
    /// Waveform converter.
    pub converter: Box<dyn TransmitConverter>,
    /// Monitoring power meter.
    pub power_meter: Box<dyn PowerMeter>,
    /// Launch-power attenuator.
    pub attenuator: Box<dyn Attenuator>,
    /// Carrier source.
    pub laser: Box<dyn Laser>,
    /// Modulator bias lock.
    pub bias: Box<dyn BiasController>,
}
