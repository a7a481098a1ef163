//! Error types for the protocol crate.

use thiserror::Error;

/// Errors that can occur while exchanging control messages.
///
/// The first four variants mirror how the engine classifies transport
/// faults: each one maps to a well-defined response (or, for
/// [`ChannelError::Disconnected`], to a session reset).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// The peer is gone (EOF, reset, or hang-up).
    #[error("peer disconnected")]
    Disconnected,

    /// A structurally valid message carried a code outside the catalogue.
    #[error("unknown control code {0}")]
    UnknownCode(u16),

    /// The peer failed channel-level authentication.
    #[error("authentication failure: {0}")]
    AuthenticationFailure(String),

    /// A malformed protocol unit (bad framing, bad encoding).
    #[error("malformed frame: {0}")]
    Frame(String),

    /// No peer is attached to the channel.
    #[error("no peer attached")]
    NotAttached,

    /// The channel has been closed locally.
    #[error("channel closed")]
    Closed,

    /// Underlying transport I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors raised when encoding or decoding a typed payload.
///
/// A decode failure on a received command is not a transport fault; the
/// engine answers it with an invalid-content response.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload serialized to something other than a JSON object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A field is missing or has the wrong type.
    #[error("invalid payload: {0}")]
    Invalid(#[from] serde_json::Error),
}
