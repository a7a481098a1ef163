//! In-memory channel pair for tests and local drills.
//!
//! [`memory_pair`] returns the server-side channel and a peer handle.
//! The peer can send well-formed messages or inject classified
//! transport errors, which is how the error-handling paths of an engine
//! are exercised without a socket.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::channel::ControlChannel;
use crate::error::{ChannelError, ChannelResult};
use crate::message::Message;

const QUEUE_DEPTH: usize = 64;

/// Server end of an in-memory channel.
pub struct MemoryControlChannel {
    incoming: mpsc::Receiver<ChannelResult<Message>>,
    outgoing: mpsc::Sender<Message>,
    attached: bool,
    peer_gone: bool,
}

/// Peer (client) end of an in-memory channel.
pub struct MemoryControlPeer {
    to_server: mpsc::Sender<ChannelResult<Message>>,
    from_server: mpsc::Receiver<Message>,
}

/// Create a connected channel/peer pair.
pub fn memory_pair() -> (MemoryControlChannel, MemoryControlPeer) {
    let (to_server, incoming) = mpsc::channel(QUEUE_DEPTH);
    let (outgoing, from_server) = mpsc::channel(QUEUE_DEPTH);
    (
        MemoryControlChannel {
            incoming,
            outgoing,
            attached: false,
            peer_gone: false,
        },
        MemoryControlPeer {
            to_server,
            from_server,
        },
    )
}

impl MemoryControlPeer {
    /// Send a message to the server side.
    pub async fn send(&self, message: Message) -> ChannelResult<()> {
        self.to_server
            .send(Ok(message))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Make the server's next `receive()` yield `err`.
    pub async fn inject(&self, err: ChannelError) -> ChannelResult<()> {
        self.to_server
            .send(Err(err))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Next message the server sent, `None` once the server closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.from_server.recv().await
    }
}

#[async_trait]
impl ControlChannel for MemoryControlChannel {
    async fn accept(&mut self) -> ChannelResult<()> {
        // The peer exists from construction; attaching is immediate.
        // Once the peer is dropped there is nothing left to attach to.
        if self.peer_gone {
            return Err(ChannelError::Closed);
        }
        self.attached = true;
        Ok(())
    }

    async fn receive(&mut self) -> ChannelResult<Message> {
        if !self.attached {
            return Err(ChannelError::NotAttached);
        }
        match self.incoming.recv().await {
            Some(result) => result,
            None => {
                self.attached = false;
                self.peer_gone = true;
                Err(ChannelError::Disconnected)
            }
        }
    }

    async fn send(&mut self, message: &Message) -> ChannelResult<()> {
        if !self.attached {
            return Err(ChannelError::NotAttached);
        }
        self.outgoing
            .send(message.clone())
            .await
            .map_err(|_| ChannelError::Disconnected)
    }

    async fn close(&mut self) -> ChannelResult<()> {
        self.attached = false;
        self.incoming.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ControlCode;

    #[tokio::test]
    async fn test_round_trip() {
        let (mut channel, mut peer) = memory_pair();
        channel.accept().await.unwrap();

        peer.send(Message::bare(ControlCode::QieTrigger))
            .await
            .unwrap();
        let msg = channel.receive().await.unwrap();
        assert_eq!(msg.code, ControlCode::QieTrigger);

        channel
            .send(&Message::bare(ControlCode::QieEmissionStarted))
            .await
            .unwrap();
        let reply = peer.recv().await.unwrap();
        assert_eq!(reply.code, ControlCode::QieEmissionStarted);
    }

    #[tokio::test]
    async fn test_injected_error_surfaces() {
        let (mut channel, peer) = memory_pair();
        channel.accept().await.unwrap();
        peer.inject(ChannelError::UnknownCode(4242)).await.unwrap();
        assert!(matches!(
            channel.receive().await,
            Err(ChannelError::UnknownCode(4242))
        ));
    }

    #[tokio::test]
    async fn test_peer_drop_is_disconnect() {
        let (mut channel, peer) = memory_pair();
        channel.accept().await.unwrap();
        drop(peer);
        assert!(matches!(
            channel.receive().await,
            Err(ChannelError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_receive_before_accept() {
        let (mut channel, _peer) = memory_pair();
        assert!(matches!(
            channel.receive().await,
            Err(ChannelError::NotAttached)
        ));
    }
}
