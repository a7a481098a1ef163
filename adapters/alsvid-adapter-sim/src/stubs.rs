//! State-recording stubs for the attenuator, laser and bias controller.

use async_trait::async_trait;
use serde_json::{Map, Value};

use alsvid_hal::{Attenuator, BiasController, HalError, HalResult, Laser};

use crate::trace::BenchLog;

/// Attenuator double; remembers every applied value.
#[derive(Debug, Default)]
pub struct SimAttenuator {
    open: bool,
    value: Option<f64>,
    history: Vec<f64>,
    log: Option<BenchLog>,
}

impl SimAttenuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: BenchLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Last applied value.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Every applied value, in order.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    fn record(&self, entry: &str) {
        if let Some(log) = &self.log {
            log.record(format!("voa.{entry}"));
        }
    }
}

#[async_trait]
impl Attenuator for SimAttenuator {
    fn name(&self) -> &str {
        "sim-attenuator"
    }

    async fn open(&mut self) -> HalResult<()> {
        self.open = true;
        self.record("open");
        Ok(())
    }

    async fn set(&mut self, value: f64) -> HalResult<()> {
        if !self.open {
            return Err(HalError::NotOpen("sim attenuator".into()));
        }
        self.value = Some(value);
        self.history.push(value);
        self.record("set");
        Ok(())
    }

    async fn close(&mut self) -> HalResult<()> {
        if self.open {
            self.open = false;
            self.record("close");
        }
        Ok(())
    }
}

/// Laser double; tracks emission state and the last parameters.
#[derive(Debug, Default)]
pub struct SimLaser {
    open: bool,
    enabled: bool,
    parameters: Map<String, Value>,
    log: Option<BenchLog>,
}

impl SimLaser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: BenchLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    fn record(&self, entry: &str) {
        if let Some(log) = &self.log {
            log.record(format!("laser.{entry}"));
        }
    }

    fn ensure_open(&self) -> HalResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(HalError::NotOpen("sim laser".into()))
        }
    }
}

#[async_trait]
impl Laser for SimLaser {
    fn name(&self) -> &str {
        "sim-laser"
    }

    async fn open(&mut self) -> HalResult<()> {
        self.open = true;
        self.record("open");
        Ok(())
    }

    async fn configure(&mut self, params: &Map<String, Value>) -> HalResult<()> {
        self.ensure_open()?;
        self.parameters = params.clone();
        self.record("configure");
        Ok(())
    }

    async fn enable(&mut self) -> HalResult<()> {
        self.ensure_open()?;
        self.enabled = true;
        self.record("enable");
        Ok(())
    }

    async fn disable(&mut self) -> HalResult<()> {
        self.ensure_open()?;
        self.enabled = false;
        self.record("disable");
        Ok(())
    }

    async fn close(&mut self) -> HalResult<()> {
        if self.open {
            self.open = false;
            self.enabled = false;
            self.record("close");
        }
        Ok(())
    }
}

/// Bias controller double; remembers the lock parameters.
#[derive(Debug, Default)]
pub struct SimBiasController {
    open: bool,
    locked: Option<Map<String, Value>>,
    log: Option<BenchLog>,
}

impl SimBiasController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: BenchLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    fn record(&self, entry: &str) {
        if let Some(log) = &self.log {
            log.record(format!("bias.{entry}"));
        }
    }
}

#[async_trait]
impl BiasController for SimBiasController {
    fn name(&self) -> &str {
        "sim-bias-controller"
    }

    async fn open(&mut self) -> HalResult<()> {
        self.open = true;
        self.record("open");
        Ok(())
    }

    async fn lock(&mut self, params: &Map<String, Value>) -> HalResult<()> {
        if !self.open {
            return Err(HalError::NotOpen("sim bias controller".into()));
        }
        self.locked = Some(params.clone());
        self.record("lock");
        Ok(())
    }

    async fn close(&mut self) -> HalResult<()> {
        if self.open {
            self.open = false;
            self.record("close");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_attenuator_history() {
        let mut voa = SimAttenuator::new();
        voa.open().await.unwrap();
        voa.set(1.5).await.unwrap();
        voa.set(2.0).await.unwrap();
        assert_eq!(voa.value(), Some(2.0));
        assert_eq!(voa.history(), [1.5, 2.0]);
    }

    #[tokio::test]
    async fn test_attenuator_guard() {
        let mut voa = SimAttenuator::new();
        assert!(matches!(voa.set(1.0).await, Err(HalError::NotOpen(_))));
    }

    #[tokio::test]
    async fn test_laser_lifecycle() {
        let mut laser = SimLaser::new();
        laser.open().await.unwrap();
        let mut params = Map::new();
        params.insert("power_mw".into(), json!(8.0));
        laser.configure(&params).await.unwrap();
        laser.enable().await.unwrap();
        assert!(laser.is_enabled());
        assert_eq!(laser.parameters()["power_mw"], json!(8.0));
        laser.close().await.unwrap();
        assert!(!laser.is_enabled());
    }

    #[tokio::test]
    async fn test_bias_lock() {
        let mut bias = SimBiasController::new();
        bias.open().await.unwrap();
        assert!(!bias.is_locked());
        bias.lock(&Map::new()).await.unwrap();
        assert!(bias.is_locked());
    }

    #[tokio::test]
    async fn test_bench_log_order_across_devices() {
        let log = crate::trace::BenchLog::new();
        let mut laser = SimLaser::new().with_log(log.clone());
        let mut voa = SimAttenuator::new().with_log(log.clone());

        laser.open().await.unwrap();
        laser.enable().await.unwrap();
        voa.open().await.unwrap();
        voa.set(3.0).await.unwrap();

        let entries = log.entries();
        assert_eq!(entries, vec!["laser.open", "laser.enable", "voa.open", "voa.set"]);
    }
}
