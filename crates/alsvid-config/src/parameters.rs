//! Runtime parameter registry.
//!
//! The peer may retune parts of the configuration between frames. Each
//! tunable leaf is registered under its dotted TOML path with a typed
//! getter and setter, so a change request either maps onto a real
//! field with a compatible value or fails without touching anything.
//! Device kinds and locations are deliberately not registered; the
//! bench is rebuilt only by a configuration reload.

use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::tree::Config;

/// Outcome of a successful change, for echoing back to the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedParameter {
    pub old: Value,
    pub new: Value,
}

struct ParameterAccessor {
    get: fn(&Config) -> Value,
    set: fn(&mut Config, &Value) -> Result<(), String>,
}

/// Registry of runtime-tunable configuration leaves.
pub struct ParameterRegistry {
    accessors: FxHashMap<&'static str, ParameterAccessor>,
}

impl ParameterRegistry {
    /// Build the registry over every tunable leaf.
    pub fn new() -> Self {
        let mut registry = Self {
            accessors: FxHashMap::default(),
        };

        registry.register(
            "frame.quantum.modulation",
            |c| json!(c.frame.quantum.modulation),
            |c, v| {
                c.frame.quantum.modulation =
                    serde_json::from_value(v.clone()).map_err(|e| e.to_string())?;
                Ok(())
            },
        );
        registry.register(
            "frame.quantum.variance",
            |c| json!(c.frame.quantum.variance),
            |c, v| {
                c.frame.quantum.variance = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.quantum.modulation_size",
            |c| json!(c.frame.quantum.modulation_size),
            |c, v| {
                c.frame.quantum.modulation_size = as_u32(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.quantum.num_symbols",
            |c| json!(c.frame.quantum.num_symbols),
            |c, v| {
                c.frame.quantum.num_symbols = as_usize(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.quantum.symbol_rate",
            |c| json!(c.frame.quantum.symbol_rate),
            |c, v| {
                c.frame.quantum.symbol_rate = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.quantum.roll_off",
            |c| json!(c.frame.quantum.roll_off),
            |c, v| {
                c.frame.quantum.roll_off = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.quantum.frequency_shift",
            |c| json!(c.frame.quantum.frequency_shift),
            |c, v| {
                c.frame.quantum.frequency_shift = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.quantum.pulsed",
            |c| json!(c.frame.quantum.pulsed),
            |c, v| {
                c.frame.quantum.pulsed = as_bool(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.pilots.frequencies",
            |c| json!(c.frame.pilots.frequencies),
            |c, v| {
                c.frame.pilots.frequencies = as_f64_list(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.pilots.amplitudes",
            |c| json!(c.frame.pilots.amplitudes),
            |c, v| {
                c.frame.pilots.amplitudes = as_f64_list(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.zadoff_chu.root",
            |c| json!(c.frame.zadoff_chu.root),
            |c, v| {
                c.frame.zadoff_chu.root = as_u32(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.zadoff_chu.length",
            |c| json!(c.frame.zadoff_chu.length),
            |c, v| {
                c.frame.zadoff_chu.length = as_u32(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.zadoff_chu.rate",
            |c| json!(c.frame.zadoff_chu.rate),
            |c, v| {
                c.frame.zadoff_chu.rate = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.num_zeros_start",
            |c| json!(c.frame.num_zeros_start),
            |c, v| {
                c.frame.num_zeros_start = as_usize(v)?;
                Ok(())
            },
        );
        registry.register(
            "frame.num_zeros_end",
            |c| json!(c.frame.num_zeros_end),
            |c, v| {
                c.frame.num_zeros_end = as_usize(v)?;
                Ok(())
            },
        );
        registry.register(
            "signal.load_final_sequence",
            |c| json!(c.signal.files.load_final_sequence),
            |c, v| {
                c.signal.files.load_final_sequence = as_bool(v)?;
                Ok(())
            },
        );
        registry.register(
            "signal.save_final_sequence",
            |c| json!(c.signal.files.save_final_sequence),
            |c, v| {
                c.signal.files.save_final_sequence = as_bool(v)?;
                Ok(())
            },
        );
        registry.register(
            "signal.final_sequence_path",
            |c| json!(c.signal.files.final_sequence_path),
            |c, v| {
                c.signal.files.final_sequence_path = as_string(v)?.into();
                Ok(())
            },
        );
        registry.register(
            "signal.save_quantum_sequence",
            |c| json!(c.signal.files.save_quantum_sequence),
            |c, v| {
                c.signal.files.save_quantum_sequence = as_bool(v)?;
                Ok(())
            },
        );
        registry.register(
            "signal.quantum_sequence_path",
            |c| json!(c.signal.files.quantum_sequence_path),
            |c, v| {
                c.signal.files.quantum_sequence_path = as_string(v)?.into();
                Ok(())
            },
        );
        registry.register(
            "signal.load_symbols",
            |c| json!(c.signal.files.load_symbols),
            |c, v| {
                c.signal.files.load_symbols = as_bool(v)?;
                Ok(())
            },
        );
        registry.register(
            "signal.save_symbols",
            |c| json!(c.signal.files.save_symbols),
            |c, v| {
                c.signal.files.save_symbols = as_bool(v)?;
                Ok(())
            },
        );
        registry.register(
            "signal.symbols_path",
            |c| json!(c.signal.files.symbols_path),
            |c, v| {
                c.signal.files.symbols_path = as_string(v)?.into();
                Ok(())
            },
        );
        registry.register(
            "signal.seed",
            |c| json!(c.signal.seed),
            |c, v| {
                c.signal.seed = as_seed(v)?;
                Ok(())
            },
        );
        registry.register(
            "transmitter.dac.rate",
            |c| json!(c.transmitter.dac.rate),
            |c, v| {
                c.transmitter.dac.rate = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "transmitter.dac.amplitude",
            |c| json!(c.transmitter.dac.amplitude),
            |c, v| {
                c.transmitter.dac.amplitude = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "transmitter.voa.value",
            |c| json!(c.transmitter.voa.value),
            |c, v| {
                c.transmitter.voa.value = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "transmitter.polarization_recovery.frequency",
            |c| json!(c.transmitter.polarization_recovery.frequency),
            |c, v| {
                c.transmitter.polarization_recovery.frequency = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "transmitter.polarization_recovery.amplitude",
            |c| json!(c.transmitter.polarization_recovery.amplitude),
            |c, v| {
                c.transmitter.polarization_recovery.amplitude = as_f64(v)?;
                Ok(())
            },
        );
        registry.register(
            "transmitter.artificial_excess_noise",
            |c| json!(c.transmitter.artificial_excess_noise),
            |c, v| {
                c.transmitter.artificial_excess_noise = as_f64(v)?;
                Ok(())
            },
        );

        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        get: fn(&Config) -> Value,
        set: fn(&mut Config, &Value) -> Result<(), String>,
    ) {
        self.accessors.insert(name, ParameterAccessor { get, set });
    }

    /// Apply one change. The configuration is mutated only when both
    /// the lookup and the value conversion succeed.
    pub fn change(
        &self,
        config: &mut Config,
        parameter: &str,
        value: &Value,
    ) -> ConfigResult<ChangedParameter> {
        let accessor = self
            .accessors
            .get(parameter)
            .ok_or_else(|| ConfigError::UnknownParameter(parameter.to_string()))?;
        let old = (accessor.get)(config);
        (accessor.set)(config, value).map_err(|reason| ConfigError::InvalidValue {
            parameter: parameter.to_string(),
            reason,
        })?;
        let new = (accessor.get)(config);
        debug!(parameter, %old, %new, "parameter changed");
        Ok(ChangedParameter { old, new })
    }

    /// Whether a dotted path is tunable.
    pub fn contains(&self, parameter: &str) -> bool {
        self.accessors.contains_key(parameter)
    }

    /// Registered paths, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.accessors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn as_f64(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected a number, got {value}"))
}

fn as_bool(value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected a boolean, got {value}"))
}

fn as_u32(value: &Value) -> Result<u32, String> {
    let n = value
        .as_u64()
        .ok_or_else(|| format!("expected a non-negative integer, got {value}"))?;
    u32::try_from(n).map_err(|_| format!("{n} is out of range"))
}

fn as_usize(value: &Value) -> Result<usize, String> {
    let n = value
        .as_u64()
        .ok_or_else(|| format!("expected a non-negative integer, got {value}"))?;
    usize::try_from(n).map_err(|_| format!("{n} is out of range"))
}

fn as_string(value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| format!("expected a string, got {value}"))
}

fn as_f64_list(value: &Value) -> Result<Vec<f64>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected an array of numbers, got {value}"))?;
    items.iter().map(as_f64).collect()
}

fn as_seed(value: &Value) -> Result<Option<u64>, String> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .map(Some)
        .ok_or_else(|| format!("expected an integer seed or null, got {value}"))
}
