//! Error types for the HAL crate.

use thiserror::Error;

/// Errors that can occur in device operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Device used before `open()` or after `close()`.
    #[error("device not open: {0}")]
    NotOpen(String),

    /// Device could not be opened.
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// No factory registered for the requested kind.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Parameters rejected by the device.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Runtime fault reported by the device.
    #[error("device fault: {0}")]
    Device(String),

    /// Timed out waiting for the device.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Underlying transport I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for device operations.
pub type HalResult<T> = Result<T, HalError>;
