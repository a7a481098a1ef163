//! Simulated bench devices.
//!
//! Five doubles implementing the `alsvid-hal` contracts, for running
//! the transmitter without hardware and for exercising device-fault
//! policy in tests:
//!
//! - [`SimConverter`] records its lifecycle and exposes the loaded
//!   sequence through a cloneable [`SimConverterProbe`].
//! - [`SimPowerMeter`] reads dark power, sees a linked converter's
//!   emission and can be fused to fail after N reads.
//! - [`SimAttenuator`], [`SimLaser`] and [`SimBiasController`] record
//!   state and honor the open/close lifecycle.
//!
//! [`register_sim_devices`] puts all five into a
//! [`DeviceRegistry`](alsvid_hal::DeviceRegistry) under the `sim`
//! kind.

pub mod converter;
pub mod meter;
pub mod registry;
pub mod stubs;
pub mod trace;

pub use converter::{ConverterEvent, SimConverter, SimConverterProbe};
pub use meter::SimPowerMeter;
pub use registry::register_sim_devices;
pub use stubs::{SimAttenuator, SimBiasController, SimLaser};
pub use trace::BenchLog;
