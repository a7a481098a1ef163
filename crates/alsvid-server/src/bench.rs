//! Bench construction and lifecycle.
//!
//! Devices are built once from the registry, opened once at startup and
//! closed once at shutdown. A failure partway through bring-up rolls
//! back everything already opened, so the engine either owns a fully
//! live bench or nothing.

use tracing::{info, warn};

use alsvid_config::Config;
use alsvid_hal::{Bench, DeviceRegistry, HalError, HalResult, RepeatMode};

use crate::error::ServerResult;

/// Build the five bench devices from the configured kinds.
pub fn build_bench(registry: &DeviceRegistry, config: &Config) -> ServerResult<Bench> {
    let t = &config.transmitter;
    Ok(Bench {
        converter: registry.create_converter(&t.dac.kind, t.dac.device_config())?,
        power_meter: registry.create_power_meter(&t.powermeter.kind, t.powermeter.device_config())?,
        attenuator: registry.create_attenuator(&t.voa.kind, t.voa.device_config())?,
        laser: registry.create_laser(&t.laser.kind, t.laser.device_config())?,
        bias: registry.create_bias_controller(&t.bias_controller.kind, t.bias_controller.device_config())?,
    })
}

/// Open and configure every device, in dependency order.
pub(crate) async fn bring_up(bench: &mut Bench, config: &Config) -> ServerResult<()> {
    let t = &config.transmitter;

    info!(driver = bench.converter.name(), "opening converter");
    bench.converter.open().await?;
    bench
        .converter
        .configure(&t.dac.emission_params(RepeatMode::Continuous))
        .await?;

    info!(driver = bench.attenuator.name(), value = t.voa.value, "opening attenuator");
    bench.attenuator.open().await?;
    bench.attenuator.set(t.voa.value).await?;

    info!(driver = bench.laser.name(), "opening laser");
    bench.laser.open().await?;
    bench.laser.configure(&t.laser.parameters).await?;
    bench.laser.enable().await?;

    info!(driver = bench.bias.name(), "locking modulator bias");
    bench.bias.open().await?;
    bench.bias.lock(&t.bias_controller.lock).await?;

    info!(driver = bench.power_meter.name(), "opening power meter");
    bench.power_meter.open().await?;

    Ok(())
}

/// Best-effort teardown; reached on every shutdown path.
pub(crate) async fn tear_down(bench: &mut Bench) {
    quiet("laser", bench.laser.disable().await);
    quiet("laser", bench.laser.close().await);
    quiet("dac", bench.converter.stop().await);
    quiet("dac", bench.converter.close().await);
    quiet("powermeter", bench.power_meter.close().await);
    quiet("voa", bench.attenuator.close().await);
    quiet("bias", bench.bias.close().await);
    info!("transmitter bench released");
}

fn quiet<T>(device: &str, result: HalResult<T>) {
    match result {
        Ok(_) => {}
        // Rolling back a partial bring-up hits devices that never opened.
        Err(HalError::NotOpen(_)) => {}
        Err(err) => warn!(device, error = %err, "teardown failure"),
    }
}
