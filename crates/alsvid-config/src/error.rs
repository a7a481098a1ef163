//! Error types for configuration loading and runtime changes.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or mutating the configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Document is not valid TOML or a field has the wrong shape.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required section is absent from the document.
    #[error("missing required section [{0}]")]
    MissingSection(&'static str),

    /// Authentication scheme other than `none`.
    #[error("unsupported authentication scheme {0:?}")]
    UnsupportedScheme(String),

    /// Runtime parameter path does not exist in the registry.
    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),

    /// Runtime parameter value is not compatible with the target field.
    #[error("invalid value for parameter {parameter:?}: {reason}")]
    InvalidValue { parameter: String, reason: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
