//! Relay transport implementations

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::codec::FrameCodec;
use crate::error::IpcError;
use crate::protocol::{Frame, PayloadFlags};

/// Duplex message channel to a single peer
#[async_trait]
pub trait Relay: Send {
    /// Send a message body with the given flags
    async fn send(&mut self, body: &[u8], flags: PayloadFlags) -> Result<(), IpcError>;

    /// Receive the next message body and its flags
    async fn receive(&mut self) -> Result<(Bytes, PayloadFlags), IpcError>;

    /// Close the relay
    async fn close(&mut self) -> Result<(), IpcError>;
}

/// Byte stream a [`SocketRelay`] can run over
pub trait RelayStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> RelayStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Relay over a connected socket (TCP, Unix, or an in-memory duplex)
pub struct SocketRelay {
    framed: Framed<Box<dyn RelayStream>, FrameCodec>,
    peer: String,
}

impl SocketRelay {
    /// Wrap a connected stream
    pub fn new<S: RelayStream + 'static>(stream: S, peer: impl Into<String>) -> Self {
        Self::with_codec(stream, peer, FrameCodec::new())
    }

    /// Wrap a connected stream with a custom codec
    pub fn with_codec<S: RelayStream + 'static>(
        stream: S,
        peer: impl Into<String>,
        codec: FrameCodec,
    ) -> Self {
        let stream: Box<dyn RelayStream> = Box::new(stream);
        Self {
            framed: Framed::new(stream, codec),
            peer: peer.into(),
        }
    }

    /// Human readable peer address, used in logs
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl fmt::Debug for SocketRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketRelay")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Relay for SocketRelay {
    async fn send(&mut self, body: &[u8], flags: PayloadFlags) -> Result<(), IpcError> {
        let frame = Frame::new(flags, Bytes::copy_from_slice(body));
        self.framed.send(frame).await
    }

    async fn receive(&mut self) -> Result<(Bytes, PayloadFlags), IpcError> {
        match self.framed.next().await {
            Some(Ok(frame)) => Ok((frame.body, frame.flags)),
            Some(Err(e)) => Err(e),
            None => Err(IpcError::ConnectionClosed),
        }
    }

    async fn close(&mut self) -> Result<(), IpcError> {
        tracing::trace!(peer = %self.peer, "closing relay");
        SinkExt::<Frame>::close(&mut self.framed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ControlMessage;

    fn relay_pair() -> (SocketRelay, SocketRelay) {
        let (a, b) = tokio::io::duplex(1024);
        (SocketRelay::new(a, "left"), SocketRelay::new(b, "right"))
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (mut left, mut right) = relay_pair();

        left.send(b"hello", PayloadFlags::RAW).await.unwrap();
        let body = ControlMessage::probe(9).to_bytes().unwrap();
        left.send(&body, PayloadFlags::CONTROL).await.unwrap();

        let (body, flags) = right.receive().await.unwrap();
        assert_eq!(&body[..], b"hello");
        assert_eq!(flags, PayloadFlags::RAW);

        let (body, flags) = right.receive().await.unwrap();
        assert_eq!(flags, PayloadFlags::CONTROL);
        assert_eq!(
            ControlMessage::from_bytes(&body).unwrap(),
            ControlMessage::probe(9)
        );
    }

    #[tokio::test]
    async fn test_receive_after_peer_dropped() {
        let (left, mut right) = relay_pair();
        drop(left);

        assert!(matches!(
            right.receive().await,
            Err(IpcError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_signals_eof() {
        let (mut left, mut right) = relay_pair();
        left.send(b"last", PayloadFlags::RAW).await.unwrap();
        left.close().await.unwrap();

        let (body, _) = right.receive().await.unwrap();
        assert_eq!(&body[..], b"last");
        assert!(matches!(
            right.receive().await,
            Err(IpcError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_debug_shows_peer() {
        let (left, _right) = relay_pair();
        assert_eq!(left.peer(), "left");
        assert!(format!("{:?}", left).contains("left"));
    }
}
