//! Error types for waveform synthesis.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while synthesizing or persisting a waveform.
///
/// All of these are recoverable from the engine's point of view: a
/// failed synthesis aborts one frame, never the process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DspError {
    /// Modulation family rejected the requested parameters.
    #[error("invalid modulation: {0}")]
    InvalidModulation(String),

    /// Rates do not yield a usable sample grid.
    #[error("invalid rate: {0}")]
    InvalidRate(String),

    /// Pulse-shaping parameters out of range.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Pilot frequency and amplitude lists differ in length.
    #[error("{frequencies} pilot frequencies but {amplitudes} amplitudes")]
    PilotMismatch {
        /// Number of configured frequencies.
        frequencies: usize,
        /// Number of configured amplitudes.
        amplitudes: usize,
    },

    /// Preamble parameters rejected (zero length, root not coprime).
    #[error("invalid preamble: {0}")]
    InvalidPreamble(String),

    /// A sequence file could not be read.
    #[error("failed to load sequence from {path}: {reason}")]
    Load {
        /// File that was being read.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// A sequence file could not be written.
    #[error("failed to save sequence to {path}: {reason}")]
    Save {
        /// File that was being written.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
}

/// Result type for synthesis operations.
pub type DspResult<T> = Result<T, DspError>;
