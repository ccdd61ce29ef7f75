//! # Receiver Module
//!
//! FBus receiver protocol engine and the execution contexts around it.
//!
//! This module handles:
//! - Buffering inbound bytes until a frame is complete
//! - The resynchronizing protocol state machine
//! - Publishing decoded channels to a lower priority consumer task
//! - Health counters (frames decoded, replies sent and skipped)
//!
//! ## Execution Contexts
//!
//! - **Protocol thread** (`fbus-protocol`): a current-thread runtime running
//!   [`ProtocolEngine::run`]; its only suspension point is waiting for bytes
//! - **Consumer task**: a task on the caller's runtime that copies each
//!   published [`ChannelSet`](crate::channels::ChannelSet) and hands it to a
//!   [`ChannelConsumer`] on the blocking pool, keeping the caller's async
//!   workers free for the serial pumps

pub mod engine;
pub mod frame_buffer;
pub mod handoff;
pub mod stats;

pub use engine::{EngineTiming, ProtocolEngine, ProtocolState};
pub use frame_buffer::{Fill, FrameBuffer};
pub use handoff::{run_consumer, ChannelConsumer, SharedChannels};
pub use stats::{ReceiverStats, StatsSnapshot};

use std::io;
use std::sync::Arc;
use std::thread;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::channels::ChannelSet;
use crate::clock::Clock;
use crate::error::{ReceiverError, Result};
use crate::link::ByteLink;
use crate::telemetry::TelemetrySource;

/// Name of the protocol thread
pub const PROTOCOL_THREAD_NAME: &str = "fbus-protocol";

/// Running FBus receiver
///
/// Dropping the receiver stops the consumer task. The protocol thread stops
/// once its byte link closes.
pub struct Receiver {
    channels: Arc<SharedChannels>,
    stats: Arc<ReceiverStats>,
    protocol: Option<thread::JoinHandle<Result<()>>>,
    consumer: JoinHandle<()>,
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("channels", &self.channels)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl Receiver {
    /// Start the protocol thread and the consumer task
    ///
    /// Must be called from within a tokio runtime; the consumer task is
    /// spawned on it.
    ///
    /// # Arguments
    ///
    /// * `link` - Byte transport to the radio receiver
    /// * `telemetry` - Source of uplink telemetry items
    /// * `consumer` - Receives every published channel set
    /// * `clock` - Time source for the sync timeout
    /// * `timing` - Sync timeout and reply deadline
    /// * `stats` - Health counters, shared with the caller
    ///
    /// # Errors
    ///
    /// Returns error if the protocol thread cannot be spawned
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use fbus_receiver::channels::ChannelSet;
    /// use fbus_receiver::clock::MonotonicClock;
    /// use fbus_receiver::config::SerialConfig;
    /// use fbus_receiver::link::serial::SerialLink;
    /// use fbus_receiver::receiver::{EngineTiming, Receiver, ReceiverStats};
    /// use fbus_receiver::telemetry::TelemetryItem;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let clock = Arc::new(MonotonicClock::new());
    ///     let (_serial, link) = SerialLink::open(&SerialConfig::default(), clock.clone())?;
    ///
    ///     let receiver = Receiver::start(
    ///         link,
    ///         TelemetryItem::null,
    ///         |set: ChannelSet| println!("ch0 = {}", set[0].raw()),
    ///         clock,
    ///         EngineTiming::default(),
    ///         Arc::new(ReceiverStats::new()),
    ///     )?;
    ///
    ///     receiver.join().await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn start<L, T, C>(
        link: L,
        telemetry: T,
        consumer: C,
        clock: Arc<dyn Clock>,
        timing: EngineTiming,
        stats: Arc<ReceiverStats>,
    ) -> Result<Self>
    where
        L: ByteLink + 'static,
        T: TelemetrySource + 'static,
        C: ChannelConsumer + 'static,
    {
        let channels = Arc::new(SharedChannels::new());

        let mut engine = ProtocolEngine::new(
            link,
            telemetry,
            clock,
            Arc::clone(&channels),
            Arc::clone(&stats),
            timing,
        );

        let protocol = thread::Builder::new()
            .name(PROTOCOL_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()?;
                runtime.block_on(engine.run())
            })?;

        let consumer = tokio::spawn(run_consumer(Arc::clone(&channels), consumer));

        info!(
            "FBus receiver started (sync timeout {} ms, uplink deadline {} us)",
            timing.sync_timeout.as_millis(),
            timing.uplink_deadline_us
        );

        Ok(Self {
            channels,
            stats,
            protocol: Some(protocol),
            consumer,
        })
    }

    /// Copy of the latest channel set
    pub fn channels(&self) -> ChannelSet {
        self.channels.snapshot()
    }

    pub fn connected(&self) -> bool {
        self.channels.connected()
    }

    pub fn rssi(&self) -> u8 {
        self.channels.rssi()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the protocol thread has exited
    pub fn is_finished(&self) -> bool {
        self.protocol.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Wait for the protocol thread to exit and stop the consumer task
    ///
    /// # Errors
    ///
    /// Returns the engine's exit reason, normally
    /// [`ReceiverError::LinkClosed`]
    pub async fn join(mut self) -> Result<()> {
        let result = match self.protocol.take() {
            Some(handle) => tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|e| ReceiverError::Io(io::Error::new(io::ErrorKind::Other, e)))?
                .unwrap_or_else(|_| {
                    error!("Protocol thread panicked");
                    Err(ReceiverError::Io(io::Error::new(io::ErrorKind::Other, "protocol thread panicked")))
                }),
            None => Ok(()),
        };

        self.consumer.abort();
        result
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}
