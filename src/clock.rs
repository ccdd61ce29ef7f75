//! # Time Source
//!
//! Microsecond timestamps shared by the byte link (last received byte) and
//! the protocol engine (sync timeout, reply deadline).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic microsecond clock
pub trait Clock: Send + Sync {
    /// Microseconds since an arbitrary fixed origin
    fn now_us(&self) -> u64;
}

/// Clock backed by [`std::time::Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Clock that only moves when told to
///
/// Used to drive sync timeouts and reply deadlines deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_us: u64) -> Self {
        Self { now_us: AtomicU64::new(start_us) }
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1_000);
    }

    pub fn set_us(&self, us: u64) {
        self.now_us.store(us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_us();
        let b = clock.now_us();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_us(), 10);
        clock.advance_us(5);
        assert_eq!(clock.now_us(), 15);
        clock.advance_ms(2);
        assert_eq!(clock.now_us(), 2_015);
        clock.set_us(1);
        assert_eq!(clock.now_us(), 1);
    }
}
