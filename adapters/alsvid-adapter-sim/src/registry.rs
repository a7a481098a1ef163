//! Registration of the simulated devices under the `sim` kind.

use serde_json::Value;

use alsvid_hal::DeviceRegistry;

use crate::converter::SimConverter;
use crate::meter::SimPowerMeter;
use crate::stubs::{SimAttenuator, SimBiasController, SimLaser};

/// Register all five simulated roles under the `sim` kind.
///
/// The power meter honors four optional `extra` keys in its device
/// configuration: `dark_power`, `emission_power`, `jitter` (watts) and
/// `fail_after_reads`. Devices built through the registry are not
/// linked to each other; linking is done explicitly when a test builds
/// the bench by hand.
pub fn register_sim_devices(registry: &mut DeviceRegistry) {
    registry.register_converter("sim", |_config| Ok(Box::new(SimConverter::new())));

    registry.register_power_meter("sim", |config| {
        let mut meter = SimPowerMeter::new();
        if let Some(watts) = config.extra.get("dark_power").and_then(Value::as_f64) {
            meter = meter.with_dark_power(watts);
        }
        if let Some(watts) = config.extra.get("emission_power").and_then(Value::as_f64) {
            meter = meter.with_emission_power(watts);
        }
        if let Some(watts) = config.extra.get("jitter").and_then(Value::as_f64) {
            meter = meter.with_jitter(watts);
        }
        if let Some(reads) = config.extra.get("fail_after_reads").and_then(Value::as_u64) {
            meter = meter.fail_after(reads);
        }
        Ok(Box::new(meter))
    });

    registry.register_attenuator("sim", |_config| Ok(Box::new(SimAttenuator::new())));
    registry.register_laser("sim", |_config| Ok(Box::new(SimLaser::new())));
    registry.register_bias_controller("sim", |_config| Ok(Box::new(SimBiasController::new())));
}
