//! # Byte Link Module
//!
//! Full-duplex byte transport between the radio receiver and the protocol
//! engine.
//!
//! This module handles:
//! - The [`ByteLink`] capability set the protocol engine is written against
//! - Fixed-capacity inbound/outbound byte queues ([`LinkQueues`])
//! - The interrupt-side handle ([`LinkIsr`]) that feeds and drains the queues
//!   and records the arrival time of the last received byte
//! - Edge-triggered transmit-ready signalling
//! - The tokio-serial backend ([`serial::SerialLink`])

pub mod serial;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use heapless::Deque;
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::error::{ReceiverError, Result};

/// Inbound queue capacity in bytes
pub const RX_QUEUE_SIZE: usize = 128;

/// Outbound queue capacity in bytes
pub const TX_QUEUE_SIZE: usize = 32;

/// Capabilities the protocol engine needs from its transport
#[async_trait]
pub trait ByteLink: Send {
    /// Wait until at least one byte is available, then move up to
    /// `buf.len()` bytes into `buf`
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::LinkClosed`] once the transport is closed and
    /// every buffered byte has been consumed.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Append a whole frame to the outbound queue
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::TxOverflow`] and queues nothing if the frame
    /// does not fit.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Microseconds since the most recent byte was received
    fn since_last_rx_us(&self) -> u64;

    /// Enable or disable the transmit-ready interrupt
    fn set_tx_interrupt(&mut self, enabled: bool);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state between the interrupt side and the engine side of a link
pub struct LinkQueues {
    inbound: Mutex<Deque<u8, RX_QUEUE_SIZE>>,
    outbound: Mutex<Deque<u8, TX_QUEUE_SIZE>>,
    rx_ready: Notify,
    tx_ready: Notify,
    tx_enabled: AtomicBool,
    closed: AtomicBool,
    last_rx_us: AtomicU64,
    overruns: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LinkQueues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkQueues")
            .field("inbound", &lock(&self.inbound).len())
            .field("outbound", &lock(&self.outbound).len())
            .field("tx_enabled", &self.tx_enabled.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl LinkQueues {
    /// Create empty queues stamped by `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        let last_rx_us = AtomicU64::new(clock.now_us());
        Arc::new(Self {
            inbound: Mutex::new(Deque::new()),
            outbound: Mutex::new(Deque::new()),
            rx_ready: Notify::new(),
            tx_ready: Notify::new(),
            tx_enabled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_rx_us,
            overruns: AtomicU64::new(0),
            clock,
        })
    }

    /// Split into the interrupt-side and engine-side handles
    pub fn split(self: &Arc<Self>) -> (LinkIsr, LinkHandle) {
        (LinkIsr { queues: Arc::clone(self) }, LinkHandle { queues: Arc::clone(self) })
    }

    fn enable_tx_interrupt(&self) {
        // Only the disabled -> enabled edge wakes the transmitter
        if !self.tx_enabled.swap(true, Ordering::AcqRel) {
            self.tx_ready.notify_one();
        }
    }
}

/// Interrupt-side handle: fed by the receive path, drained by the transmit path
#[derive(Debug, Clone)]
pub struct LinkIsr {
    queues: Arc<LinkQueues>,
}

impl LinkIsr {
    /// Push received bytes and stamp the arrival time
    ///
    /// Bytes that do not fit are dropped and counted as overruns.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of bytes queued
    pub fn on_rx(&self, bytes: &[u8]) -> usize {
        let queues = &self.queues;

        let queued = {
            let mut inbound = lock(&queues.inbound);
            bytes.iter().take_while(|&&b| inbound.push_back(b).is_ok()).count()
        };

        queues.last_rx_us.store(queues.clock.now_us(), Ordering::Release);

        if queued < bytes.len() {
            queues.overruns.fetch_add((bytes.len() - queued) as u64, Ordering::Relaxed);
        }
        if queued > 0 {
            queues.rx_ready.notify_one();
        }

        queued
    }

    /// Move queued outbound bytes into `out`
    ///
    /// Disables the transmit-ready interrupt once the queue is empty.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of bytes written to `out`
    pub fn drain_tx(&self, out: &mut [u8]) -> usize {
        let mut outbound = lock(&self.queues.outbound);

        let mut n = 0;
        while n < out.len() {
            match outbound.pop_front() {
                Some(b) => {
                    out[n] = b;
                    n += 1;
                }
                None => break,
            }
        }

        if outbound.is_empty() {
            self.queues.tx_enabled.store(false, Ordering::Release);
        }

        n
    }

    /// Wait until the transmit-ready interrupt is enabled or the link closes
    pub async fn wait_tx_ready(&self) {
        loop {
            if self.tx_interrupt_enabled() || self.is_closed() {
                return;
            }
            self.queues.tx_ready.notified().await;
        }
    }

    pub fn tx_interrupt_enabled(&self) -> bool {
        self.queues.tx_enabled.load(Ordering::Acquire)
    }

    /// Close the link; the engine sees [`ReceiverError::LinkClosed`] after
    /// draining what is already queued
    pub fn close(&self) {
        self.queues.closed.store(true, Ordering::Release);
        self.queues.rx_ready.notify_one();
        self.queues.tx_ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.queues.closed.load(Ordering::Acquire)
    }

    /// Received bytes dropped because the inbound queue was full
    pub fn overruns(&self) -> u64 {
        self.queues.overruns.load(Ordering::Relaxed)
    }
}

/// Engine-side handle implementing [`ByteLink`]
#[derive(Debug)]
pub struct LinkHandle {
    queues: Arc<LinkQueues>,
}

impl LinkHandle {
    /// Received bytes dropped because the inbound queue was full
    pub fn overruns(&self) -> u64 {
        self.queues.overruns.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ByteLink for LinkHandle {
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let n = {
                let mut inbound = lock(&self.queues.inbound);
                let mut n = 0;
                while n < buf.len() {
                    match inbound.pop_front() {
                        Some(b) => {
                            buf[n] = b;
                            n += 1;
                        }
                        None => break,
                    }
                }
                n
            };

            if n > 0 || buf.is_empty() {
                return Ok(n);
            }

            if self.queues.closed.load(Ordering::Acquire) {
                return Err(ReceiverError::LinkClosed);
            }

            self.queues.rx_ready.notified().await;
        }
    }

    /// Queue the whole frame or none of it
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut outbound = lock(&self.queues.outbound);
        if outbound.capacity() - outbound.len() < bytes.len() {
            return Err(ReceiverError::TxOverflow { dropped: bytes.len() });
        }

        for &b in bytes {
            // Capacity checked above
            let _ = outbound.push_back(b);
        }
        Ok(())
    }

    fn since_last_rx_us(&self) -> u64 {
        let last = self.queues.last_rx_us.load(Ordering::Acquire);
        self.queues.clock.now_us().saturating_sub(last)
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        if enabled {
            self.queues.enable_tx_interrupt();
        } else {
            self.queues.tx_enabled.store(false, Ordering::Release);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tokio_test::{assert_pending, assert_ready, assert_ready_ok};

    fn make_link() -> (Arc<ManualClock>, LinkIsr, LinkHandle) {
        let clock = Arc::new(ManualClock::new(1_000));
        let (isr, link) = LinkQueues::new(clock.clone()).split();
        (clock, isr, link)
    }

    #[tokio::test]
    async fn test_recv_returns_queued_bytes() {
        let (_clock, isr, mut link) = make_link();
        assert_eq!(isr.on_rx(&[1, 2, 3]), 3);

        let mut buf = [0u8; 2];
        assert_eq!(link.recv(&mut buf).await.unwrap(), 2);
        assert_eq!(buf, [1, 2]);

        let mut buf = [0u8; 8];
        assert_eq!(link.recv(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], 3);
    }

    #[test]
    fn test_recv_suspends_until_bytes_arrive() {
        let (_clock, isr, mut link) = make_link();
        let mut buf = [0u8; 4];

        let mut recv = tokio_test::task::spawn(link.recv(&mut buf));
        assert_pending!(recv.poll());

        isr.on_rx(&[0xAA]);
        assert!(recv.is_woken());
        assert_eq!(assert_ready_ok!(recv.poll()), 1);
    }

    #[tokio::test]
    async fn test_recv_after_close_drains_then_fails() {
        let (_clock, isr, mut link) = make_link();
        isr.on_rx(&[7]);
        isr.close();

        let mut buf = [0u8; 4];
        assert_eq!(link.recv(&mut buf).await.unwrap(), 1);
        assert!(matches!(link.recv(&mut buf).await, Err(ReceiverError::LinkClosed)));
    }

    #[tokio::test]
    async fn test_inbound_overrun_is_counted() {
        let (_clock, isr, link) = make_link();
        let burst = [0x55u8; RX_QUEUE_SIZE + 10];

        assert_eq!(isr.on_rx(&burst), RX_QUEUE_SIZE);
        assert_eq!(isr.overruns(), 10);
        assert_eq!(link.overruns(), 10);
    }

    #[test]
    fn test_last_rx_timestamp() {
        let (clock, isr, link) = make_link();

        clock.advance_us(500);
        isr.on_rx(&[1]);
        assert_eq!(link.since_last_rx_us(), 0);

        clock.advance_us(1_200);
        assert_eq!(link.since_last_rx_us(), 1_200);
    }

    #[test]
    fn test_tx_interrupt_edge() {
        let (_clock, isr, mut link) = make_link();
        assert!(!isr.tx_interrupt_enabled());

        let mut ready = tokio_test::task::spawn(isr.wait_tx_ready());
        assert_pending!(ready.poll());

        link.send(&[1, 2, 3]).unwrap();
        link.set_tx_interrupt(true);
        assert!(ready.is_woken());
        assert_ready!(ready.poll());
        drop(ready);

        let mut out = [0u8; 2];
        assert_eq!(isr.drain_tx(&mut out), 2);
        assert!(isr.tx_interrupt_enabled(), "still bytes pending");

        assert_eq!(isr.drain_tx(&mut out), 1);
        assert_eq!(out[0], 3);
        assert!(!isr.tx_interrupt_enabled(), "drained queue disables the interrupt");
    }

    #[test]
    fn test_tx_interrupt_enable_is_idempotent() {
        let (_clock, isr, mut link) = make_link();

        link.set_tx_interrupt(true);
        link.set_tx_interrupt(true);
        assert!(isr.tx_interrupt_enabled());

        link.set_tx_interrupt(false);
        assert!(!isr.tx_interrupt_enabled());
    }

    #[test]
    fn test_outbound_overflow() {
        let (_clock, isr, mut link) = make_link();
        let frame = [0u8; TX_QUEUE_SIZE + 3];

        match link.send(&frame) {
            Err(ReceiverError::TxOverflow { dropped }) => assert_eq!(dropped, TX_QUEUE_SIZE + 3),
            other => panic!("Expected TxOverflow, got: {:?}", other),
        }

        let mut out = [0u8; TX_QUEUE_SIZE + 3];
        assert_eq!(isr.drain_tx(&mut out), 0);
    }

    #[test]
    fn test_rejected_frame_leaves_queue_unchanged() {
        let (_clock, isr, mut link) = make_link();

        for id in 1..=3u8 {
            link.send(&[id; 10]).unwrap();
        }
        match link.send(&[4u8; 10]) {
            Err(ReceiverError::TxOverflow { dropped }) => assert_eq!(dropped, 10),
            other => panic!("Expected TxOverflow, got: {:?}", other),
        }

        let mut out = [0u8; TX_QUEUE_SIZE];
        assert_eq!(isr.drain_tx(&mut out), 30);
        assert_eq!(out[..10], [1u8; 10]);
        assert_eq!(out[20..30], [3u8; 10]);
        assert!(!out[..30].contains(&4));

        // Room again once drained
        link.send(&[5u8; 10]).unwrap();
        assert_eq!(isr.drain_tx(&mut out), 10);
        assert_eq!(out[..10], [5u8; 10]);
    }

    #[test]
    fn test_wait_tx_ready_returns_on_close() {
        let (_clock, isr, _link) = make_link();
        let closer = isr.clone();

        let mut ready = tokio_test::task::spawn(isr.wait_tx_ready());
        assert_pending!(ready.poll());

        closer.close();
        assert_ready!(ready.poll());
    }
}
