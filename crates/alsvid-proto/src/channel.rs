//! Channel contract.
//!
//! A [`ControlChannel`] carries [`Message`] units between exactly two
//! peers, one of which (this side) plays the server role.
//!
//! # Contract
//!
//! - At most one peer is attached at a time. `accept()` blocks until a
//!   peer attaches and MUST be called again after a disconnection.
//! - `receive()` returns one complete message or a classified
//!   [`ChannelError`]; it never yields a partial unit. It is
//!   cancel-safe: dropping the future never discards bytes of a
//!   partially received unit.
//! - `send()` transmits one complete message before returning.
//! - Transport errors do not poison the channel object: after a
//!   `Disconnected` error the same channel can `accept()` a new peer.

use async_trait::async_trait;

use crate::error::ChannelResult;
use crate::message::Message;

/// Bidirectional, message-oriented control transport.
#[async_trait]
pub trait ControlChannel: Send {
    /// Wait for a peer to attach.
    async fn accept(&mut self) -> ChannelResult<()>;

    /// Receive the next message from the attached peer.
    async fn receive(&mut self) -> ChannelResult<Message>;

    /// Send one message to the attached peer.
    async fn send(&mut self, message: &Message) -> ChannelResult<()>;

    /// Detach the peer and release transport resources.
    async fn close(&mut self) -> ChannelResult<()>;
}
