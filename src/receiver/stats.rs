//! Receiver health counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters written by the protocol engine, readable from any task
#[derive(Debug, Default)]
pub struct ReceiverStats {
    control_frames: AtomicU64,
    telemetry_sent: AtomicU64,
    telemetry_skipped: AtomicU64,
    link_losses: AtomicU64,
    resync_dropped: AtomicU64,
    tx_overflows: AtomicU64,
}

/// Point-in-time copy of [`ReceiverStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Control frames decoded
    pub control_frames: u64,

    /// Telemetry replies queued for transmission
    pub telemetry_sent: u64,

    /// Polls addressed to us that missed the reply deadline
    pub telemetry_skipped: u64,

    /// Transitions into the frame-lost state caused by the sync timeout
    pub link_losses: u64,

    /// Bytes discarded while hunting for a control frame
    pub resync_dropped: u64,

    /// Replies that did not fit into the outbound queue
    pub tx_overflows: u64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_control_frame(&self) {
        self.control_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_telemetry_sent(&self) {
        self.telemetry_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_telemetry_skipped(&self) {
        self.telemetry_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_link_loss(&self) {
        self.link_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resync_drop(&self, bytes: usize) {
        self.resync_dropped.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_tx_overflow(&self) {
        self.tx_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn control_frames(&self) -> u64 {
        self.control_frames.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            control_frames: self.control_frames.load(Ordering::Relaxed),
            telemetry_sent: self.telemetry_sent.load(Ordering::Relaxed),
            telemetry_skipped: self.telemetry_skipped.load(Ordering::Relaxed),
            link_losses: self.link_losses.load(Ordering::Relaxed),
            resync_dropped: self.resync_dropped.load(Ordering::Relaxed),
            tx_overflows: self.tx_overflows.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "control: {}  telemetry: sent={} skipped={}  losses: {}  resync dropped: {}",
            self.control_frames,
            self.telemetry_sent,
            self.telemetry_skipped,
            self.link_losses,
            self.resync_dropped,
        )?;
        if self.tx_overflows > 0 {
            write!(f, "  tx overflows: {}", self.tx_overflows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = ReceiverStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_snapshot_reflects_records() {
        let stats = ReceiverStats::new();
        stats.record_control_frame();
        stats.record_control_frame();
        stats.record_telemetry_sent();
        stats.record_telemetry_skipped();
        stats.record_link_loss();
        stats.record_resync_drop(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.control_frames, 2);
        assert_eq!(snapshot.telemetry_sent, 1);
        assert_eq!(snapshot.telemetry_skipped, 1);
        assert_eq!(snapshot.link_losses, 1);
        assert_eq!(snapshot.resync_dropped, 3);
        assert_eq!(snapshot.tx_overflows, 0);
        assert_eq!(stats.control_frames(), 2);
    }

    #[test]
    fn test_display() {
        let snapshot = StatsSnapshot {
            control_frames: 5,
            telemetry_sent: 2,
            telemetry_skipped: 1,
            ..Default::default()
        };
        let line = snapshot.to_string();
        assert!(line.contains("control: 5"));
        assert!(line.contains("sent=2 skipped=1"));
        assert!(!line.contains("tx overflows"));
    }
}
