//! Configuration for the Alsvid transmitter.
//!
//! One TOML document drives the whole system. This crate owns:
//!
//! - the typed [`Config`] tree and its loading/validation
//! - conversion into the synthesis and device inputs of the other
//!   crates
//! - the [`ParameterRegistry`] through which the peer retunes
//!   individual leaves at runtime
//!
//! Loading never terminates the process; every failure surfaces as a
//! [`ConfigError`] for the caller to decide.

pub mod error;
pub mod parameters;
pub mod tree;

pub use error::{ConfigError, ConfigResult};
pub use parameters::{ChangedParameter, ParameterRegistry};
pub use tree::{
    AuthenticationConfig, BiasControllerConfig, Config, DacConfig, FrameConfig, LaserConfig,
    NetworkConfig, PilotsConfig, PolarizationRecoveryConfig, PowerMeterConfig, QuantumConfig,
    SignalConfig, TransmitterConfig, VoaConfig, ZadoffChuConfig,
};
