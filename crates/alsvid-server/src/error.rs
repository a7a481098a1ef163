//! Error types for the engine.

use thiserror::Error;

use alsvid_config::ConfigError;
use alsvid_dsp::DspError;
use alsvid_hal::HalError;
use alsvid_proto::ChannelError;

/// Errors that can occur while running the engine.
///
/// Most faults never reach this type: protocol violations are answered
/// on the channel and synthesis failures abort the frame. What remains
/// is what the caller of [`Engine`](crate::Engine) must decide about.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Control channel fault that could not be classified and answered.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Fault reported by a bench device.
    #[error("device error: {0}")]
    Device(#[from] HalError),

    /// Waveform synthesis failure.
    #[error("synthesis error: {0}")]
    Synthesis(#[from] DspError),

    /// Configuration problem.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Photon-number calibration could not run.
    #[error("calibration error: {0}")]
    Calibration(String),
}

/// Result type for engine operations.
pub type ServerResult<T> = Result<T, ServerError>;
