//! Device registry: from configuration strings to live instruments.
//!
//! Drivers register a factory per instrument role under a kind string
//! (`"sim"`, `"visa"`, ...); the engine then builds its bench from
//! configuration without naming concrete driver types.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::device::{Attenuator, BiasController, DeviceConfig, Laser, PowerMeter, TransmitConverter};
use crate::error::{HalError, HalResult};

type ConverterFactory =
    Box<dyn Fn(DeviceConfig) -> HalResult<Box<dyn TransmitConverter>> + Send + Sync>;
type PowerMeterFactory = Box<dyn Fn(DeviceConfig) -> HalResult<Box<dyn PowerMeter>> + Send + Sync>;
type AttenuatorFactory = Box<dyn Fn(DeviceConfig) -> HalResult<Box<dyn Attenuator>> + Send + Sync>;
type LaserFactory = Box<dyn Fn(DeviceConfig) -> HalResult<Box<dyn Laser>> + Send + Sync>;
type BiasControllerFactory =
    Box<dyn Fn(DeviceConfig) -> HalResult<Box<dyn BiasController>> + Send + Sync>;

/// Central registry of device factories, one namespace per role.
///
/// The same kind string may appear in several roles (a simulator
/// typically registers all five).
#[derive(Default)]
pub struct DeviceRegistry {
    converters: FxHashMap<String, ConverterFactory>,
    power_meters: FxHashMap<String, PowerMeterFactory>,
    attenuators: FxHashMap<String, AttenuatorFactory>,
    lasers: FxHashMap<String, LaserFactory>,
    bias_controllers: FxHashMap<String, BiasControllerFactory>,
}

impl DeviceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter factory under `kind`.
    pub fn register_converter(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(DeviceConfig) -> HalResult<Box<dyn TransmitConverter>> + Send + Sync + 'static,
    ) {
        let kind = kind.into();
        debug!(%kind, "registering converter factory");
        self.converters.insert(kind, Box::new(factory));
    }

    /// Register a power-meter factory under `kind`.
    pub fn register_power_meter(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(DeviceConfig) -> HalResult<Box<dyn PowerMeter>> + Send + Sync + 'static,
    ) {
        let kind = kind.into();
        debug!(%kind, "registering power-meter factory");
        self.power_meters.insert(kind, Box::new(factory));
    }

    /// Register an attenuator factory under `kind`.
    pub fn register_attenuator(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(DeviceConfig) -> HalResult<Box<dyn Attenuator>> + Send + Sync + 'static,
    ) {
        let kind = kind.into();
        debug!(%kind, "registering attenuator factory");
        self.attenuators.insert(kind, Box::new(factory));
    }

    /// Register a laser factory under `kind`.
    pub fn register_laser(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(DeviceConfig) -> HalResult<Box<dyn Laser>> + Send + Sync + 'static,
    ) {
        let kind = kind.into();
        debug!(%kind, "registering laser factory");
        self.lasers.insert(kind, Box::new(factory));
    }

    /// Register a bias-controller factory under `kind`.
    pub fn register_bias_controller(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(DeviceConfig) -> HalResult<Box<dyn BiasController>> + Send + Sync + 'static,
    ) {
        let kind = kind.into();
        debug!(%kind, "registering bias-controller factory");
        self.bias_controllers.insert(kind, Box::new(factory));
    }

    /// Build a converter of the given kind.
    pub fn create_converter(
        &self,
        kind: &str,
        config: DeviceConfig,
    ) -> HalResult<Box<dyn TransmitConverter>> {
        match self.converters.get(kind) {
            Some(factory) => factory(config),
            None => Err(HalError::UnknownDevice(format!(
                "no converter registered for kind '{kind}'"
            ))),
        }
    }

    /// Build a power meter of the given kind.
    pub fn create_power_meter(
        &self,
        kind: &str,
        config: DeviceConfig,
    ) -> HalResult<Box<dyn PowerMeter>> {
        match self.power_meters.get(kind) {
            Some(factory) => factory(config),
            None => Err(HalError::UnknownDevice(format!(
                "no power meter registered for kind '{kind}'"
            ))),
        }
    }

    /// Build an attenuator of the given kind.
    pub fn create_attenuator(
        &self,
        kind: &str,
        config: DeviceConfig,
    ) -> HalResult<Box<dyn Attenuator>> {
        match self.attenuators.get(kind) {
            Some(factory) => factory(config),
            None => Err(HalError::UnknownDevice(format!(
                "no attenuator registered for kind '{kind}'"
            ))),
        }
    }

    /// Build a laser of the given kind.
    pub fn create_laser(&self, kind: &str, config: DeviceConfig) -> HalResult<Box<dyn Laser>> {
        match self.lasers.get(kind) {
            Some(factory) => factory(config),
            None => Err(HalError::UnknownDevice(format!(
                "no laser registered for kind '{kind}'"
            ))),
        }
    }

    /// Build a bias controller of the given kind.
    pub fn create_bias_controller(
        &self,
        kind: &str,
        config: DeviceConfig,
    ) -> HalResult<Box<dyn BiasController>> {
        match self.bias_controllers.get(kind) {
            Some(factory) => factory(config),
            None => Err(HalError::UnknownDevice(format!(
                "no bias controller registered for kind '{kind}'"
            ))),
        }
    }

    /// All kind strings registered in any role, sorted and deduplicated.
    pub fn registered_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .converters
            .keys()
            .chain(self.power_meters.keys())
            .chain(self.attenuators.keys())
            .chain(self.lasers.keys())
            .chain(self.bias_controllers.keys())
            .cloned()
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}
