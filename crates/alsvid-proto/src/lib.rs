//! Control-protocol vocabulary and channel transports.
//!
//! This crate defines everything two endpoints of a quantum-exchange
//! link agree on before any physics happens:
//!
//! - [`ControlCode`] — the command/response catalogue, numbered in
//!   blocks of 100 by protocol phase.
//! - [`Message`] — one protocol unit: a code plus an optional JSON
//!   payload, with typed payload structs for every structured command.
//! - [`ControlChannel`] — the transport contract, with a framed-TCP
//!   implementation ([`TcpControlChannel`]) and an in-memory pair for
//!   tests ([`memory_pair`]).
//! - [`ChannelError`] — the transport-fault taxonomy the engine
//!   classifies before dispatch.
//!
//! The crate carries no protocol state machine; legality of a command
//! in a given state is the engine's concern.
//!
//! # Example
//!
//! ```no_run
//! use alsvid_proto::{ControlChannel, ControlCode, Message, TcpControlChannel};
//!
//! # async fn demo() -> alsvid_proto::ChannelResult<()> {
//! let mut channel = TcpControlChannel::bind("0.0.0.0:8100").await?;
//! channel.accept().await?;
//! let request = channel.receive().await?;
//! channel.send(&Message::bare(ControlCode::UnexpectedCommand)).await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod code;
pub mod error;
pub mod memory;
pub mod message;
pub mod tcp;

pub use channel::ControlChannel;
pub use code::ControlCode;
pub use error::{ChannelError, ChannelResult, PayloadError};
pub use memory::{MemoryControlChannel, MemoryControlPeer, memory_pair};
pub use message::{
    AbortNotice, ChangeParameter, DenyNotice, ErrorNotice, EstimationSummary, FrameEndedAck,
    IdentificationRequest, IdentificationResponse, InitializationRequest, InvalidVersion, Message,
    ParameterChanged, ParameterUnknown, Payload, PhotonNumberResponse, SymbolsRequest,
    SymbolsResponse,
};
pub use tcp::TcpControlChannel;

/// Protocol version both peers must present during identification.
/// Compared by exact string equality.
pub const PROTOCOL_VERSION: &str = "0.2";
