//! Scratch buffer between the byte link and the frame decoders.

use std::time::Duration;

use crate::error::Result;
use crate::link::ByteLink;

/// Scratch capacity; holds the largest control frame with room to spare
pub const FRAME_BUFFER_SIZE: usize = 64;

/// Outcome of [`FrameBuffer::require`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The requested number of bytes is buffered
    Ready,

    /// The line stayed silent for the whole idle timeout
    Idle,
}

/// Accumulates inbound bytes until a complete frame is available
///
/// `require` is the only point where the protocol engine suspends.
#[derive(Debug)]
pub struct FrameBuffer<L> {
    link: L,
    scratch: [u8; FRAME_BUFFER_SIZE],
    len: usize,
    idle_timeout: Option<Duration>,
}

impl<L: ByteLink> FrameBuffer<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            scratch: [0; FRAME_BUFFER_SIZE],
            len: 0,
            idle_timeout: None,
        }
    }

    /// Give up waiting for bytes after `timeout` of line silence
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Pull bytes from the link until at least `n` are buffered
    ///
    /// Requests never exceed [`FRAME_BUFFER_SIZE`]. Bytes already buffered
    /// are kept when the call returns [`Fill::Idle`].
    ///
    /// # Errors
    ///
    /// Propagates the link's error, normally
    /// [`ReceiverError::LinkClosed`](crate::error::ReceiverError::LinkClosed).
    pub async fn require(&mut self, n: usize) -> Result<Fill> {
        let n = n.min(FRAME_BUFFER_SIZE);

        while self.len < n {
            let dst = &mut self.scratch[self.len..n];
            let received = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.link.recv(dst)).await {
                    Ok(received) => received?,
                    Err(_) => return Ok(Fill::Idle),
                },
                None => self.link.recv(dst).await?,
            };
            self.len += received;
        }

        Ok(Fill::Ready)
    }

    /// Drop the first `k` buffered bytes and shift the rest to the front
    pub fn discard(&mut self, k: usize) {
        let k = k.min(self.len);
        self.scratch.copy_within(k..self.len, 0);
        self.len -= k;
    }

    /// Queue bytes for transmission and raise the transmit-ready interrupt
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let queued = self.link.send(bytes);
        self.link.set_tx_interrupt(true);
        queued
    }

    /// Currently buffered bytes
    pub fn bytes(&self) -> &[u8] {
        &self.scratch[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn since_last_rx_us(&self) -> u64 {
        self.link.since_last_rx_us()
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}
