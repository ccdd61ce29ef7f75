//! # FBus Protocol Engine
//!
//! Resynchronizing state machine over the inbound byte stream.
//!
//! ```text
//!            valid control frame
//! Syncing ───────────────────────▶ ReadControl ──▶ ReadDownlink ──┬─▶ WriteUplink ──┐
//!    ▲                                 ▲                          │  (id == 0x67)   │
//!    │ header/size/CRC mismatch        │                          └─────────────────┤
//!    └─────────────────────────────────┼──────────────────── ReadUplink ◀───────────┘
//!                                      └──────────────────────────┘
//! ```
//!
//! While syncing the search window slides by one byte on a wrong id byte
//! and by two bytes on an unknown size or a bad checksum, so any finite
//! input is consumed in bounded time. Every other state falls back to
//! Syncing on a malformed frame.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::frame_buffer::{Fill, FrameBuffer};
use super::handoff::SharedChannels;
use super::stats::ReceiverStats;
use crate::channels::{ChannelSet, LinkFlags};
use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::error::{ReceiverError, Result};
use crate::fbus::decoder::{check_control_header, decode_control_frame, decode_sport_frame};
use crate::fbus::encoder::encode_uplink_frame;
use crate::fbus::protocol::*;
use crate::link::ByteLink;
use crate::telemetry::TelemetrySource;

/// Protocol engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Hunting for a valid control frame
    Syncing,

    /// Expecting a control frame at the buffer start
    ReadControl,

    /// Expecting the downlink poll that follows every control frame
    ReadDownlink,

    /// The poll was addressed to us; reply if still inside the deadline
    WriteUplink,

    /// Skipping an optional uplink reply from any sensor on the bus
    ReadUplink,
}

/// Engine timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTiming {
    /// Silence after which the link is declared lost
    pub sync_timeout: Duration,

    /// Latest reply time after the last received byte, in µs
    pub uplink_deadline_us: u64,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS),
            uplink_deadline_us: DEFAULT_UPLINK_DEADLINE_US,
        }
    }
}

impl From<&ProtocolConfig> for EngineTiming {
    fn from(config: &ProtocolConfig) -> Self {
        Self {
            sync_timeout: Duration::from_millis(config.sync_timeout_ms),
            uplink_deadline_us: config.uplink_deadline_us,
        }
    }
}

/// FBus receiver protocol engine
///
/// Owns the byte link and the telemetry source; publishes decoded channels
/// into [`SharedChannels`] and counts its progress in [`ReceiverStats`].
pub struct ProtocolEngine<L, T> {
    buffer: FrameBuffer<L>,
    telemetry: T,
    clock: Arc<dyn Clock>,
    channels: Arc<SharedChannels>,
    stats: Arc<ReceiverStats>,
    timing: EngineTiming,
    state: ProtocolState,
    sync_begin_us: u64,
    seq: u32,
}

impl<L, T> std::fmt::Debug for ProtocolEngine<L, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("state", &self.state)
            .field("timing", &self.timing)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl<L, T> ProtocolEngine<L, T>
where
    L: ByteLink,
    T: TelemetrySource,
{
    /// Create an engine in the Syncing state
    ///
    /// # Arguments
    ///
    /// * `link` - Byte transport
    /// * `telemetry` - Source polled once per answered downlink
    /// * `clock` - Time source for the sync timeout
    /// * `channels` - Where decoded channel sets are published
    /// * `stats` - Health counters
    /// * `timing` - Sync timeout and reply deadline
    pub fn new(
        link: L,
        telemetry: T,
        clock: Arc<dyn Clock>,
        channels: Arc<SharedChannels>,
        stats: Arc<ReceiverStats>,
        timing: EngineTiming,
    ) -> Self {
        let sync_begin_us = clock.now_us();

        Self {
            buffer: FrameBuffer::new(link).with_idle_timeout(timing.sync_timeout),
            telemetry,
            clock,
            channels,
            stats,
            timing,
            state: ProtocolState::Syncing,
            sync_begin_us,
            seq: 0,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn link(&self) -> &L {
        self.buffer.link()
    }

    /// Run the state machine until the link closes
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::LinkClosed`] when the transport goes away;
    /// malformed input is never an error.
    pub async fn run(&mut self) -> Result<()> {
        info!("FBus protocol engine started");
        loop {
            self.step().await?;
        }
    }

    /// Execute one state handler
    pub async fn step(&mut self) -> Result<()> {
        match self.state {
            ProtocolState::Syncing => self.do_sync().await,
            ProtocolState::ReadControl => self.do_read_control().await,
            ProtocolState::ReadDownlink => self.do_read_downlink().await,
            ProtocolState::WriteUplink => self.do_write_uplink(),
            ProtocolState::ReadUplink => self.do_read_uplink().await,
        }
    }

    fn enter(&mut self, state: ProtocolState) {
        trace!("{:?} -> {:?} ({} bytes buffered)", self.state, state, self.buffer.len());
        self.state = state;
    }

    fn begin_sync(&mut self) {
        self.enter(ProtocolState::Syncing);
        self.sync_begin_us = self.clock.now_us();
    }

    /// The line went quiet while waiting for the rest of a frame
    fn on_idle(&mut self) {
        // Syncing keeps its start time so the next pass trips the timeout
        if self.state != ProtocolState::Syncing {
            debug!("Line idle in {:?}, resynchronizing", self.state);
            self.begin_sync();
        }
    }

    fn drop_for_resync(&mut self, bytes: usize) {
        self.buffer.discard(bytes);
        self.stats.record_resync_drop(bytes);
    }

    fn lost_sync(&mut self) {
        warn!(
            "No valid control frame for {} ms, marking link lost",
            self.timing.sync_timeout.as_millis()
        );
        self.channels.update(ChannelSet::mark_lost);
        self.stats.record_link_loss();
    }

    async fn do_sync(&mut self) -> Result<()> {
        let searching_us = self.clock.now_us().saturating_sub(self.sync_begin_us);
        if searching_us > self.timing.sync_timeout.as_micros() as u64 && self.channels.connected() {
            self.lost_sync();
        }

        if self.buffer.require(FBUS_CONTROL_HDR_SIZE).await? == Fill::Idle {
            self.on_idle();
            return Ok(());
        }

        let len = match check_control_header(self.buffer.bytes()) {
            Ok(len) => len,
            Err(FrameError::BadHeader(_)) => {
                self.drop_for_resync(1);
                return Ok(());
            }
            Err(_) => {
                self.drop_for_resync(2);
                return Ok(());
            }
        };

        if self.buffer.require(len).await? == Fill::Idle {
            self.on_idle();
            return Ok(());
        }

        match decode_control_frame(self.buffer.bytes()) {
            Ok(_) => {
                debug!("Found control frame, in sync");
                self.enter(ProtocolState::ReadControl);
            }
            Err(_) => self.drop_for_resync(2),
        }

        Ok(())
    }

    async fn do_read_control(&mut self) -> Result<()> {
        if self.buffer.require(FBUS_CONTROL_HDR_SIZE).await? == Fill::Idle {
            self.on_idle();
            return Ok(());
        }

        let len = match check_control_header(self.buffer.bytes()) {
            Ok(len) => len,
            Err(e) => {
                debug!("Lost sync on control header: {}", e);
                self.begin_sync();
                return Ok(());
            }
        };

        if self.buffer.require(len).await? == Fill::Idle {
            self.on_idle();
            return Ok(());
        }

        let frame = match decode_control_frame(self.buffer.bytes()) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Lost sync on control frame: {}", e);
                self.begin_sync();
                return Ok(());
            }
        };
        self.buffer.discard(len);

        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        self.stats.record_control_frame();

        let was_connected = self.channels.update(|set| {
            let was_connected = set.connected();
            set.apply_control(&frame, seq);
            was_connected
        });

        let flags = LinkFlags::from_bits(frame.flags);
        if !was_connected && !flags.frame_lost() {
            info!("Radio link up ({} channels, rssi {})", frame.count, frame.rssi);
        } else if was_connected && flags.frame_lost() {
            info!("Receiver reports frame lost");
        }

        self.enter(ProtocolState::ReadDownlink);
        Ok(())
    }

    async fn do_read_downlink(&mut self) -> Result<()> {
        if self.buffer.require(FBUS_DOWNLINK_SIZE).await? == Fill::Idle {
            self.on_idle();
            return Ok(());
        }

        let poll = match decode_sport_frame(self.buffer.bytes()) {
            Ok(poll) => poll,
            Err(e) => {
                debug!("Bad downlink frame: {}", e);
                self.begin_sync();
                return Ok(());
            }
        };
        self.buffer.discard(FBUS_DOWNLINK_SIZE);

        if poll.is_for_us() {
            self.enter(ProtocolState::WriteUplink);
        } else {
            self.enter(ProtocolState::ReadUplink);
        }
        Ok(())
    }

    fn do_write_uplink(&mut self) -> Result<()> {
        let elapsed_us = self.buffer.since_last_rx_us();

        if elapsed_us > self.timing.uplink_deadline_us {
            debug!("Missed uplink window by {} us", elapsed_us - self.timing.uplink_deadline_us);
            self.stats.record_telemetry_skipped();
            self.enter(ProtocolState::ReadUplink);
            return Ok(());
        }

        let item = self.telemetry.next_telemetry();
        let frame = encode_uplink_frame(&item);

        match self.buffer.send(&frame) {
            Ok(()) => self.stats.record_telemetry_sent(),
            Err(ReceiverError::TxOverflow { dropped }) => {
                warn!("Uplink reply dropped, outbound queue full ({} bytes)", dropped);
                self.stats.record_tx_overflow();
            }
            Err(e) => return Err(e),
        }

        self.enter(ProtocolState::ReadUplink);
        Ok(())
    }

    async fn do_read_uplink(&mut self) -> Result<()> {
        if self.buffer.require(FBUS_DOWNLINK_HDR_SIZE).await? == Fill::Idle {
            self.on_idle();
            return Ok(());
        }

        if self.buffer.bytes()[0] != FBUS_UPLINK_HDR {
            // Nobody answered the poll
            self.enter(ProtocolState::ReadControl);
            return Ok(());
        }

        if self.buffer.require(FBUS_UPLINK_SIZE).await? == Fill::Idle {
            self.on_idle();
            return Ok(());
        }

        match decode_sport_frame(self.buffer.bytes()) {
            Ok(_) => {
                self.buffer.discard(FBUS_UPLINK_SIZE);
                self.enter(ProtocolState::ReadControl);
            }
            Err(e) => {
                debug!("Bad uplink frame: {}", e);
                self.begin_sync();
            }
        }
        Ok(())
    }
}
