//! Simulated optical power meter.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use alsvid_hal::{HalError, HalResult, PowerMeter};

use crate::converter::SimConverterProbe;
use crate::trace::BenchLog;

/// Power meter double.
///
/// Reads a dark power, plus an emission power whenever a linked
/// [`SimConverter`](crate::converter::SimConverter) is playing, plus
/// optional uniform jitter. A fail-after-N fuse turns the meter into a
/// faulty device for error-policy tests.
#[derive(Debug)]
pub struct SimPowerMeter {
    open: bool,
    dark_power: f64,
    emission_power: f64,
    jitter: f64,
    fail_after: Option<u64>,
    reads: u64,
    link: Option<SimConverterProbe>,
    log: Option<BenchLog>,
    rng: StdRng,
}

impl SimPowerMeter {
    pub fn new() -> Self {
        Self {
            open: false,
            dark_power: 1e-9,
            emission_power: 1e-6,
            jitter: 0.0,
            fail_after: None,
            reads: 0,
            link: None,
            log: None,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Power reported with no light on the detector, in watts.
    pub fn with_dark_power(mut self, watts: f64) -> Self {
        self.dark_power = watts;
        self
    }

    /// Extra power reported while the linked converter is playing.
    pub fn with_emission_power(mut self, watts: f64) -> Self {
        self.emission_power = watts;
        self
    }

    /// Half-width of the uniform noise added to every read.
    pub fn with_jitter(mut self, watts: f64) -> Self {
        self.jitter = watts;
        self
    }

    /// Make every read after the first `reads` fail.
    pub fn fail_after(mut self, reads: u64) -> Self {
        self.fail_after = Some(reads);
        self
    }

    /// See the converter's playback state through its probe.
    pub fn linked_to(mut self, probe: SimConverterProbe) -> Self {
        self.link = Some(probe);
        self
    }

    /// Attach a bench-wide call log.
    pub fn with_log(mut self, log: BenchLog) -> Self {
        self.log = Some(log);
        self
    }

    fn record(&self, entry: &str) {
        if let Some(log) = &self.log {
            log.record(format!("powermeter.{entry}"));
        }
    }
}

impl Default for SimPowerMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PowerMeter for SimPowerMeter {
    fn name(&self) -> &str {
        "sim-powermeter"
    }

    async fn open(&mut self) -> HalResult<()> {
        self.open = true;
        self.record("open");
        Ok(())
    }

    async fn read(&mut self) -> HalResult<f64> {
        if !self.open {
            return Err(HalError::NotOpen("sim power meter".into()));
        }
        if let Some(limit) = self.fail_after {
            if self.reads >= limit {
                return Err(HalError::Device(format!(
                    "sim power meter fuse blown after {limit} reads"
                )));
            }
        }
        self.reads += 1;

        let emitting = self.link.as_ref().is_some_and(SimConverterProbe::is_playing);
        let mut power = self.dark_power;
        if emitting {
            power += self.emission_power;
        }
        if self.jitter > 0.0 {
            power += self.rng.gen_range(-self.jitter..=self.jitter);
        }
        debug!(power, emitting, "sim power meter read");
        Ok(power)
    }

    async fn close(&mut self) -> HalResult<()> {
        if self.open {
            self.open = false;
            self.record("close");
        }
        Ok(())
    }
}
