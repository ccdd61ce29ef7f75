//! # Round-Robin Telemetry Provider
//!
//! Cycles through registered sensor slots, one slot per answered poll.
//!
//! ## Usage
//!
//! ```
//! use fbus_receiver::telemetry::{RoundRobin, TelemetryItem, TelemetrySource};
//!
//! let mut provider = RoundRobin::new();
//! provider.add_slot(|| TelemetryItem::temperature1(0, 40));
//! provider.add_slot(|| TelemetryItem::a3(0, 5.0));
//!
//! assert_eq!(provider.next_telemetry().app_id, 0x0400);
//! assert_eq!(provider.next_telemetry().app_id, 0x0900);
//! assert_eq!(provider.next_telemetry().app_id, 0x0400);
//! ```

use super::{TelemetryItem, TelemetrySource};

type Slot = Box<dyn FnMut() -> TelemetryItem + Send>;

/// Telemetry source rotating over a fixed list of slots
#[derive(Default)]
pub struct RoundRobin {
    slots: Vec<Slot>,
    next: usize,
    served: u64,
}

impl std::fmt::Debug for RoundRobin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundRobin")
            .field("slots", &self.slots.len())
            .field("next", &self.next)
            .field("served", &self.served)
            .finish()
    }
}

impl RoundRobin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot; slots are served in registration order
    pub fn add_slot<F>(&mut self, slot: F)
    where
        F: FnMut() -> TelemetryItem + Send + 'static,
    {
        self.slots.push(Box::new(slot));
    }

    /// Builder form of [`RoundRobin::add_slot`]
    #[must_use]
    pub fn with_slot<F>(mut self, slot: F) -> Self
    where
        F: FnMut() -> TelemetryItem + Send + 'static,
    {
        self.add_slot(slot);
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of items handed out so far
    pub fn served(&self) -> u64 {
        self.served
    }
}

impl TelemetrySource for RoundRobin {
    fn next_telemetry(&mut self) -> TelemetryItem {
        self.served += 1;

        if self.slots.is_empty() {
            return TelemetryItem::null();
        }

        let slot = self.next;
        self.next = (self.next + 1) % self.slots.len();
        (self.slots[slot])()
    }
}
