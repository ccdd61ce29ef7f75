//! # Channel Snapshot Handoff
//!
//! The protocol engine owns the authoritative [`ChannelSet`] behind a short
//! critical section and wakes the consumer task after every write. The
//! consumer task copies the set under the same lock and hands it to the
//! [`ChannelConsumer`] on the blocking pool, so a slow consumer holds up
//! neither the parse/reply loop nor the serial pumps sharing its runtime.
//!
//! Wake-ups coalesce: a consumer that falls behind sees the latest snapshot,
//! not every intermediate one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{error, trace};

use crate::channels::ChannelSet;

/// Receives a copy of the channel set after each decoded control frame and
/// each transition into the frame-lost state
#[cfg_attr(test, mockall::automock)]
pub trait ChannelConsumer: Send {
    fn on_control_frame(&mut self, channels: ChannelSet);
}

impl<F> ChannelConsumer for F
where
    F: FnMut(ChannelSet) + Send,
{
    fn on_control_frame(&mut self, channels: ChannelSet) {
        self(channels)
    }
}

/// Lock-protected channel set plus the consumer wake-up signal
#[derive(Debug, Default)]
pub struct SharedChannels {
    current: Mutex<ChannelSet>,
    changed: Notify,
    published: AtomicU64,
}

impl SharedChannels {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelSet> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the latest channel set
    pub fn snapshot(&self) -> ChannelSet {
        *self.lock()
    }

    pub fn connected(&self) -> bool {
        self.lock().connected()
    }

    pub fn rssi(&self) -> u8 {
        self.lock().rssi()
    }

    /// Number of updates published so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Modify the set under the lock, then wake the consumer
    pub(crate) fn update<R>(&self, apply: impl FnOnce(&mut ChannelSet) -> R) -> R {
        let result = {
            let mut current = self.lock();
            apply(&mut current)
        };

        self.published.fetch_add(1, Ordering::AcqRel);
        self.changed.notify_one();
        result
    }

    /// Wait for the next update and return a copy of the set
    pub async fn changed(&self) -> ChannelSet {
        self.changed.notified().await;
        self.snapshot()
    }
}

/// Consumer task body: deliver every published snapshot to `consumer`
///
/// Each call runs on the blocking pool; the consumer may block for as long
/// as it likes. Runs until the surrounding task is aborted or the consumer
/// panics.
pub async fn run_consumer<C>(shared: std::sync::Arc<SharedChannels>, mut consumer: C)
where
    C: ChannelConsumer + 'static,
{
    loop {
        let channels = shared.changed().await;
        trace!("Delivering channel set seq {}", channels.seq());

        let delivered = tokio::task::spawn_blocking(move || {
            consumer.on_control_frame(channels);
            consumer
        })
        .await;

        consumer = match delivered {
            Ok(consumer) => consumer,
            Err(e) => {
                error!("Channel consumer stopped: {}", e);
                return;
            }
        };
    }
}
