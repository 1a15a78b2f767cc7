//! Byte-block transport between the two link endpoints.

use std::future::Future;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("peer closed the channel")]
    Closed,
}

/// One end of a bidirectional block channel.
///
/// The channel itself is reliable and ordered; loss and corruption are
/// injected by the driver before a block is handed to [`Channel::send`].
pub trait Channel: Send {
    fn send(&self, block: Bytes) -> Result<(), ChannelError>;

    /// Next block from the peer, or `None` once the peer is gone and every
    /// queued block has been read.
    fn receive(&mut self) -> impl Future<Output = Option<Bytes>> + Send;
}

/// In-process channel end backed by unbounded tokio queues.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryChannel {
    /// Two connected ends: what one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { tx: a_tx, rx: a_rx },
            Self { tx: b_tx, rx: b_rx },
        )
    }
}

impl Channel for MemoryChannel {
    fn send(&self, block: Bytes) -> Result<(), ChannelError> {
        self.tx.send(block).map_err(|_| ChannelError::Closed)
    }

    fn receive(&mut self) -> impl Future<Output = Option<Bytes>> + Send {
        self.rx.recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_cross_in_both_directions() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send(Bytes::from_static(b"ping")).expect("b is alive");
        b.send(Bytes::from_static(b"pong")).expect("a is alive");
        assert_eq!(b.receive().await.as_deref(), Some(&b"ping"[..]));
        assert_eq!(a.receive().await.as_deref(), Some(&b"pong"[..]));
    }

    #[tokio::test]
    async fn dropped_peer_drains_then_ends() {
        let (a, mut b) = MemoryChannel::pair();
        a.send(Bytes::from_static(b"last")).expect("b is alive");
        drop(a);
        assert!(b.receive().await.is_some());
        assert!(b.receive().await.is_none());
        assert_eq!(b.send(Bytes::new()), Err(ChannelError::Closed));
    }
}
