//! TCP channel: 4-byte big-endian length prefix + JSON envelope.
//!
//! The envelope is `{"code": <u16>, "data": {...}}` with `data`
//! optional. The length prefix counts the JSON bytes only.

use std::io::ErrorKind;
use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::channel::ControlChannel;
use crate::code::ControlCode;
use crate::error::{ChannelError, ChannelResult};
use crate::message::{Message, Payload};

/// Upper bound on one encoded message. A frame above this is malformed,
/// not merely large: the biggest legitimate unit (a symbols response)
/// stays well below it.
pub const MAX_UNIT_BYTES: usize = 64 * 1024 * 1024;

/// Wire shape of one unit. Deserializing through this keeps the
/// unknown-code case separate from JSON syntax errors.
#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Payload>,
}

/// Server-side TCP control channel: one listener, at most one peer.
///
/// Received bytes accumulate in an internal buffer, so `receive()` is
/// cancel-safe: dropping the future between polls never loses part of
/// a unit.
pub struct TcpControlChannel {
    listener: TcpListener,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    rx_buf: Vec<u8>,
}

impl TcpControlChannel {
    /// Bind the listener. No peer is attached yet.
    pub async fn bind(addr: impl ToSocketAddrs) -> ChannelResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "control channel listening");
        Ok(Self {
            listener,
            stream: None,
            peer: None,
            rx_buf: Vec::new(),
        })
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> ChannelResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Address of the attached peer, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn drop_peer(&mut self) {
        self.stream = None;
        self.peer = None;
        self.rx_buf.clear();
    }

    /// Pop one complete unit body off the receive buffer, if present.
    fn take_unit(&mut self) -> ChannelResult<Option<Vec<u8>>> {
        if self.rx_buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([
            self.rx_buf[0],
            self.rx_buf[1],
            self.rx_buf[2],
            self.rx_buf[3],
        ]) as usize;
        if len > MAX_UNIT_BYTES {
            // Consume the prefix so a bad peer cannot pin the loop.
            self.rx_buf.drain(..4);
            return Err(ChannelError::Frame(format!(
                "unit of {len} bytes exceeds the {MAX_UNIT_BYTES}-byte limit"
            )));
        }
        if self.rx_buf.len() < 4 + len {
            return Ok(None);
        }
        let body = self.rx_buf[4..4 + len].to_vec();
        self.rx_buf.drain(..4 + len);
        Ok(Some(body))
    }
}

fn decode_unit(body: &[u8]) -> ChannelResult<Message> {
    let envelope: WireEnvelope =
        serde_json::from_slice(body).map_err(|err| ChannelError::Frame(err.to_string()))?;
    let code = ControlCode::try_from(envelope.code)?;
    debug!(code = %code, bytes = body.len(), "received");
    Ok(Message {
        code,
        data: envelope.data,
    })
}

/// Map low-level read/write errors: peer-gone kinds become
/// `Disconnected`, everything else stays an I/O error.
fn classify_io(err: std::io::Error) -> ChannelError {
    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => ChannelError::Disconnected,
        _ => ChannelError::Io(err),
    }
}

#[async_trait]
impl ControlChannel for TcpControlChannel {
    async fn accept(&mut self) -> ChannelResult<()> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        info!(%peer, "peer attached");
        self.stream = Some(stream);
        self.peer = Some(peer);
        self.rx_buf.clear();
        Ok(())
    }

    async fn receive(&mut self) -> ChannelResult<Message> {
        loop {
            if let Some(body) = self.take_unit()? {
                return decode_unit(&body);
            }
            let stream = self.stream.as_mut().ok_or(ChannelError::NotAttached)?;
            match stream.read_buf(&mut self.rx_buf).await {
                Ok(0) => {
                    self.drop_peer();
                    return Err(ChannelError::Disconnected);
                }
                Ok(_) => {}
                Err(err) => {
                    let err = classify_io(err);
                    if matches!(err, ChannelError::Disconnected) {
                        self.drop_peer();
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn send(&mut self, message: &Message) -> ChannelResult<()> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotAttached)?;
        let envelope = WireEnvelope {
            code: message.code.into(),
            data: message.data.clone(),
        };
        let body = serde_json::to_vec(&envelope)
            .map_err(|err| ChannelError::Frame(err.to_string()))?;
        if body.len() > MAX_UNIT_BYTES {
            return Err(ChannelError::Frame(format!(
                "outgoing unit of {} bytes exceeds the {MAX_UNIT_BYTES}-byte limit",
                body.len()
            )));
        }

        let len = (body.len() as u32).to_be_bytes();
        if let Err(err) = async {
            stream.write_all(&len).await?;
            stream.write_all(&body).await?;
            stream.flush().await
        }
        .await
        {
            let err = classify_io(err);
            if matches!(err, ChannelError::Disconnected) {
                self.drop_peer();
            }
            return Err(err);
        }
        debug!(code = %message.code, bytes = body.len(), "sent");
        Ok(())
    }

    async fn close(&mut self) -> ChannelResult<()> {
        if let Some(mut stream) = self.stream.take() {
            // The peer may already be gone; a failed shutdown is not an error.
            if let Err(err) = stream.shutdown().await {
                debug!(error = %err, "shutdown on close");
            }
        }
        self.peer = None;
        Ok(())
    }
}
