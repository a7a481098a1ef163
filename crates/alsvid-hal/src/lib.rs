//! Hardware abstraction layer for the transmitter bench.
//!
//! The engine talks to five instrument roles through async trait
//! objects; concrete drivers live in adapter crates and register
//! themselves in a [`DeviceRegistry`] keyed by kind strings from the
//! configuration file.
//!
//! ```text
//!   DeviceRegistry ──create_*()──▶ Box<dyn TransmitConverter> ──┐
//!                                  Box<dyn PowerMeter>          │
//!                                  Box<dyn Attenuator>          ├─▶ Bench
//!                                  Box<dyn Laser>               │
//!                                  Box<dyn BiasController>    ──┘
//! ```
//!
//! Drivers are deliberately dumb: lifecycle (`open`/`close` ordering,
//! repeat-mode discipline around calibration) is owned by the engine,
//! not by the HAL.

pub mod device;
pub mod error;
pub mod registry;

pub use device::{
    Attenuator, Bench, BiasController, DeviceConfig, EmissionParams, Laser, PowerMeter,
    RepeatMode, TransmitConverter,
};
pub use error::{HalError, HalResult};
pub use registry::DeviceRegistry;
