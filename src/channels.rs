//! # Channel Data
//!
//! Decoded control-channel values, link flags and the versioned channel
//! snapshot handed to consumers.
//!
//! ## Value Ranges
//!
//! - Raw channel value: 8-1976 (stored clamped)
//! - Center value: 992
//! - Servo pulse: 500-2500 µs

use serde::Serialize;

use crate::fbus::protocol::{ControlFrame, MAX_CHANNELS};

/// One proportional control axis as received from the radio
///
/// # Examples
///
/// ```
/// use fbus_receiver::channels::ChannelValue;
///
/// let value = ChannelValue::new(992);
/// assert_eq!(value.as_float(), 0.0);
/// assert_eq!(value.as_button(3), 1);
/// assert_eq!(ChannelValue::new(5000).raw(), ChannelValue::MAX.raw());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelValue(u16);

impl ChannelValue {
    /// Lowest raw value sent by the receiver
    pub const CHANNEL_MIN: u16 = 8;
    /// Highest raw value sent by the receiver
    pub const CHANNEL_MAX: u16 = 1976;
    /// Raw span between minimum and maximum
    pub const CHANNEL_RANGE: u16 = Self::CHANNEL_MAX - Self::CHANNEL_MIN;
    /// Raw value of a centered stick
    pub const CHANNEL_CENTER: u16 = 992;

    /// Servo pulse width at the channel minimum (µs)
    pub const SERVO_MIN_US: u32 = 500;
    /// Servo pulse width at the channel maximum (µs)
    pub const SERVO_MAX_US: u32 = 2500;

    pub const MIN: ChannelValue = ChannelValue(Self::CHANNEL_MIN);
    pub const MAX: ChannelValue = ChannelValue(Self::CHANNEL_MAX);
    pub const CENTER: ChannelValue = ChannelValue(Self::CHANNEL_CENTER);

    /// Create a channel value, clamping into the representable range
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        let raw = if raw < Self::CHANNEL_MIN {
            Self::CHANNEL_MIN
        } else if raw > Self::CHANNEL_MAX {
            Self::CHANNEL_MAX
        } else {
            raw
        };
        Self(raw)
    }

    /// Raw stored value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Position as a fraction of the full range (0.0 to 1.0)
    pub fn as_percent(self) -> f32 {
        (self.0 - Self::CHANNEL_MIN) as f32 / Self::CHANNEL_RANGE as f32
    }

    /// Signed position around center (-1.0 to 1.0)
    pub fn as_float(self) -> f32 {
        2.0 * (self.0 as f32 - Self::CHANNEL_CENTER as f32) / Self::CHANNEL_RANGE as f32
    }

    /// Discrete position of a switch with `positions` equally spaced stops
    ///
    /// Returns 0 for fewer than two positions. More stops than raw steps are
    /// capped at one stop per raw value.
    pub fn as_button(self, positions: u16) -> u16 {
        if positions < 2 {
            return 0;
        }
        let positions = positions.min(Self::CHANNEL_RANGE + 1);
        let step = Self::CHANNEL_RANGE / (positions - 1);
        (self.0 - Self::CHANNEL_MIN + step / 2) / step
    }

    /// Two-position switch state
    pub fn as_toggle(self) -> bool {
        self.as_button(2) != 0
    }

    /// Servo pulse width in microseconds
    pub fn as_servo_pulse_us(self) -> u32 {
        Self::SERVO_MIN_US
            + (self.0 - Self::CHANNEL_MIN) as u32 * (Self::SERVO_MAX_US - Self::SERVO_MIN_US)
                / Self::CHANNEL_RANGE as u32
    }
}

impl Default for ChannelValue {
    fn default() -> Self {
        Self::CENTER
    }
}

impl From<u16> for ChannelValue {
    fn from(raw: u16) -> Self {
        Self::new(raw)
    }
}

impl std::ops::Neg for ChannelValue {
    type Output = ChannelValue;

    /// Mirror around the middle of the raw range
    fn neg(self) -> Self::Output {
        ChannelValue(Self::CHANNEL_MAX - self.0 + Self::CHANNEL_MIN)
    }
}

/// Link status bits carried in every control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LinkFlags(u8);

impl LinkFlags {
    pub const CH17: u8 = 1 << 0;
    pub const CH18: u8 = 1 << 1;
    pub const FRAME_LOST: u8 = 1 << 2;
    pub const FAILSAFE: u8 = 1 << 3;

    /// Link starts down until the first valid control frame
    pub const INITIAL: LinkFlags = LinkFlags(Self::FRAME_LOST);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn ch17(self) -> bool {
        self.0 & Self::CH17 != 0
    }

    pub fn ch18(self) -> bool {
        self.0 & Self::CH18 != 0
    }

    pub fn frame_lost(self) -> bool {
        self.0 & Self::FRAME_LOST != 0
    }

    pub fn failsafe(self) -> bool {
        self.0 & Self::FAILSAFE != 0
    }
}

impl Default for LinkFlags {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Snapshot of all channels decoded from one control frame
///
/// Copied by value to consumers; never aliased with the protocol engine's
/// live copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    sync: bool,
    seq: u32,
    flags: LinkFlags,
    rssi: u8,
    count: usize,
    values: [ChannelValue; MAX_CHANNELS],
}

impl ChannelSet {
    /// Channel count reported before the first control frame
    pub const INITIAL_COUNT: usize = 16;

    /// Whether the engine was in sync when this snapshot was written
    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Control frame sequence number
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn flags(&self) -> LinkFlags {
        self.flags
    }

    pub fn rssi(&self) -> u8 {
        self.rssi
    }

    /// Number of valid channels (8, 16 or 24)
    pub fn count(&self) -> usize {
        self.count
    }

    /// Valid channels
    pub fn channels(&self) -> &[ChannelValue] {
        &self.values[..self.count]
    }

    /// Channel `n`, if it was present in the last frame
    pub fn get(&self, n: usize) -> Option<ChannelValue> {
        self.channels().get(n).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChannelValue> + '_ {
        self.channels().iter().copied()
    }

    /// Whether the radio link is currently up
    pub fn connected(&self) -> bool {
        !self.flags.frame_lost()
    }

    /// Overwrite every field from a validated control frame
    pub(crate) fn apply_control(&mut self, frame: &ControlFrame, seq: u32) {
        self.sync = true;
        self.seq = seq;
        self.flags = LinkFlags::from_bits(frame.flags);
        self.rssi = frame.rssi;
        self.count = frame.count;
        for (dst, &raw) in self.values.iter_mut().zip(frame.channels[..frame.count].iter()) {
            *dst = ChannelValue::new(raw);
        }
    }

    /// Mark the link as down, keeping the last channel values
    pub(crate) fn mark_lost(&mut self) {
        self.flags = LinkFlags::INITIAL;
        self.rssi = 0;
        self.sync = false;
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self {
            sync: false,
            seq: 0,
            flags: LinkFlags::INITIAL,
            rssi: 0,
            count: Self::INITIAL_COUNT,
            values: [ChannelValue::CENTER; MAX_CHANNELS],
        }
    }
}

impl std::ops::Index<usize> for ChannelSet {
    type Output = ChannelValue;

    fn index(&self, n: usize) -> &Self::Output {
        &self.channels()[n]
    }
}
