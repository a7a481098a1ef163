//! Shared call log across a simulated bench.

use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable log that every simulated device on a bench can append to,
/// so tests can assert the order of calls across devices.
///
/// Entries are `"device.method"` strings, e.g. `"laser.enable"`.
#[derive(Debug, Clone, Default)]
pub struct BenchLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl BenchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Position of the first entry equal to `needle`, if any.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(|e| e == needle)
    }
}
