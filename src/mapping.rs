//! # Transmitter Mapping
//!
//! Decodes a [`ChannelSet`] into the named controls of a FrSky Taranis X9D+.
//!
//! ## Channel Layout
//!
//! | Channel | Control |
//! |---------|---------|
//! | 0-3 | Left X, left Y, right X, right Y sticks |
//! | 4-5 | S1, S2 dials |
//! | 6-7 | Left and right side sliders |
//! | 8 | SA, SB, SE (3-way) and SF (2-way), packed |
//! | 9 | SC, SD, SG (3-way) and SH (2-way), packed |
//! | 10 | SI (2-way) |
//!
//! Packed channels are produced by mixing the switches with weights 1, 4, 16
//! and 32 on the radio, so the channel carries a 7 bit field: two bits per
//! 3-way switch and one for the 2-way switch.

use std::fmt;

use serde::Serialize;

use crate::channels::{ChannelSet, ChannelValue};

const PACKED_BASE: u16 = 471;
const PACKED_SCALE: u16 = 10;
const PACKED_OFFSET: u16 = 16;
const PACKED_DIVISOR: u16 = 98;

/// Position of a 3-way switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Toggle {
    #[default]
    P0,
    P1,
    P2,
}

impl Toggle {
    /// Position from a 2-bit field; the unused value 3 reads as P2
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Toggle::P0,
            1 => Toggle::P1,
            _ => Toggle::P2,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Unpack a mixed switch channel into its 7 bit field
fn packed_switches(value: ChannelValue) -> u16 {
    let raw = value.raw().max(ChannelValue::CHANNEL_MIN);
    (raw.saturating_sub(PACKED_BASE) * PACKED_SCALE + PACKED_OFFSET) / PACKED_DIVISOR
}

/// Named controls of a Taranis X9D+ transmitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaranisX9DPlus {
    pub left_x: ChannelValue,
    pub left_y: ChannelValue,
    pub right_x: ChannelValue,
    pub right_y: ChannelValue,
    pub s1: ChannelValue,
    pub s2: ChannelValue,
    pub slider_l: ChannelValue,
    pub slider_r: ChannelValue,
    pub sa: Toggle,
    pub sb: Toggle,
    pub sc: Toggle,
    pub sd: Toggle,
    pub se: Toggle,
    pub sf: bool,
    pub sg: Toggle,
    pub sh: bool,
    pub si: bool,
}

impl Default for TaranisX9DPlus {
    fn default() -> Self {
        Self {
            left_x: ChannelValue::CENTER,
            left_y: ChannelValue::CENTER,
            right_x: ChannelValue::CENTER,
            right_y: ChannelValue::CENTER,
            s1: ChannelValue::CENTER,
            s2: ChannelValue::CENTER,
            slider_l: ChannelValue::CENTER,
            slider_r: ChannelValue::CENTER,
            sa: Toggle::P1,
            sb: Toggle::P0,
            sc: Toggle::P0,
            sd: Toggle::P0,
            se: Toggle::P0,
            sf: false,
            sg: Toggle::P0,
            sh: false,
            si: false,
        }
    }
}

impl TaranisX9DPlus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update every control from a channel set
    ///
    /// Channels missing from a short (8 channel) frame read as centered.
    ///
    /// # Examples
    ///
    /// ```
    /// use fbus_receiver::channels::ChannelSet;
    /// use fbus_receiver::mapping::TaranisX9DPlus;
    ///
    /// let mut radio = TaranisX9DPlus::new();
    /// radio.set(&ChannelSet::default());
    /// assert_eq!(radio.left_x.as_float(), 0.0);
    /// ```
    pub fn set(&mut self, channels: &ChannelSet) {
        let ch = |n: usize| channels.get(n).unwrap_or_default();

        self.left_x = ch(0);
        self.left_y = ch(1);
        self.right_x = ch(2);
        self.right_y = ch(3);

        self.s1 = ch(4);
        self.s2 = ch(5);
        self.slider_l = ch(6);
        self.slider_r = ch(7);

        let value = packed_switches(ch(8));
        self.sa = Toggle::from_bits(value);
        self.sb = Toggle::from_bits(value >> 2);
        self.se = Toggle::from_bits(value >> 4);
        self.sf = (value >> 6) & 1 != 0;

        let value = packed_switches(ch(9));
        self.sc = Toggle::from_bits(value);
        self.sd = Toggle::from_bits(value >> 2);
        self.sg = Toggle::from_bits(value >> 4);
        self.sh = (value >> 6) & 1 != 0;

        self.si = ch(10).as_toggle();
    }
}

impl From<&ChannelSet> for TaranisX9DPlus {
    fn from(channels: &ChannelSet) -> Self {
        let mut radio = Self::new();
        radio.set(channels);
        radio
    }
}

impl fmt::Display for TaranisX9DPlus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "left=({:.2},{:.2}) right=({:.2},{:.2}) s1={:.2} s2={:.2} sL={:.2} sR={:.2} ",
            self.left_x.as_float(),
            self.left_y.as_float(),
            self.right_x.as_float(),
            self.right_y.as_float(),
            self.s1.as_percent(),
            self.s2.as_percent(),
            self.slider_l.as_float(),
            self.slider_r.as_float(),
        )?;
        write!(
            f,
            "sa={} sb={} sc={} sd={} se={} sf={} sg={} sh={} si={}",
            self.sa.index(),
            self.sb.index(),
            self.sc.index(),
            self.sd.index(),
            self.se.index(),
            u8::from(self.sf),
            self.sg.index(),
            u8::from(self.sh),
            u8::from(self.si),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbus::protocol::{ControlFrame, MAX_CHANNELS};

    fn channel_set(values: &[u16]) -> ChannelSet {
        let mut channels = [ChannelValue::CHANNEL_CENTER; MAX_CHANNELS];
        channels[..values.len()].copy_from_slice(values);

        let mut set = ChannelSet::default();
        set.apply_control(
            &ControlFrame { count: 16, channels, flags: 0, rssi: 100 },
            0,
        );
        set
    }

    /// Raw value the radio mixes for a given switch field
    fn packed_raw(field: u16) -> u16 {
        PACKED_BASE + ((field * PACKED_DIVISOR).saturating_sub(PACKED_OFFSET) + PACKED_SCALE - 1) / PACKED_SCALE
    }

    #[test]
    fn test_default_positions() {
        let radio = TaranisX9DPlus::default();
        assert_eq!(radio.sa, Toggle::P1);
        assert_eq!(radio.sb, Toggle::P0);
        assert!(!radio.sf);
        assert_eq!(radio.left_x, ChannelValue::CENTER);
    }

    #[test]
    fn test_toggle_from_bits() {
        assert_eq!(Toggle::from_bits(0), Toggle::P0);
        assert_eq!(Toggle::from_bits(1), Toggle::P1);
        assert_eq!(Toggle::from_bits(2), Toggle::P2);
        assert_eq!(Toggle::from_bits(3), Toggle::P2);
        assert_eq!(Toggle::from_bits(0b101), Toggle::P1);
    }

    #[test]
    fn test_sticks_and_sliders() {
        let radio = TaranisX9DPlus::from(&channel_set(&[8, 1976, 992, 500, 1000, 1100, 1200, 1300]));
        assert_eq!(radio.left_x.raw(), 8);
        assert_eq!(radio.left_y.raw(), 1976);
        assert_eq!(radio.right_x.raw(), 992);
        assert_eq!(radio.right_y.raw(), 500);
        assert_eq!(radio.s1.raw(), 1000);
        assert_eq!(radio.s2.raw(), 1100);
        assert_eq!(radio.slider_l.raw(), 1200);
        assert_eq!(radio.slider_r.raw(), 1300);
    }

    #[test]
    fn test_packed_switches_channel_8() {
        // sf=1, se=P1, sb=P2, sa=P1
        let field = 0b1_01_10_01;
        assert_eq!(packed_raw(field), 1342);

        let mut values = [992u16; 11];
        values[8] = packed_raw(field);
        let radio = TaranisX9DPlus::from(&channel_set(&values));

        assert_eq!(radio.sa, Toggle::P1);
        assert_eq!(radio.sb, Toggle::P2);
        assert_eq!(radio.se, Toggle::P1);
        assert!(radio.sf);
    }

    #[test]
    fn test_packed_switches_channel_9() {
        // sh=0, sg=P2, sd=P0, sc=P2
        let field = 0b0_10_00_10;

        let mut values = [992u16; 11];
        values[9] = packed_raw(field);
        let radio = TaranisX9DPlus::from(&channel_set(&values));

        assert_eq!(radio.sc, Toggle::P2);
        assert_eq!(radio.sd, Toggle::P0);
        assert_eq!(radio.sg, Toggle::P2);
        assert!(!radio.sh);
    }

    #[test]
    fn test_every_packed_field_round_trips() {
        for field in 0..128u16 {
            assert_eq!(packed_switches(ChannelValue::new(packed_raw(field))), field);
        }
    }

    #[test]
    fn test_low_packed_value_reads_all_off() {
        let mut values = [992u16; 11];
        values[8] = 8;
        values[9] = 200;
        let radio = TaranisX9DPlus::from(&channel_set(&values));

        assert_eq!(radio.sa, Toggle::P0);
        assert_eq!(radio.sb, Toggle::P0);
        assert!(!radio.sf);
        assert_eq!(radio.sc, Toggle::P0);
        assert!(!radio.sh);
    }

    #[test]
    fn test_si_toggle() {
        let mut values = [992u16; 11];
        values[10] = 1976;
        assert!(TaranisX9DPlus::from(&channel_set(&values)).si);

        values[10] = 8;
        assert!(!TaranisX9DPlus::from(&channel_set(&values)).si);
    }

    #[test]
    fn test_missing_channels_read_centered() {
        let mut set = ChannelSet::default();
        set.apply_control(
            &ControlFrame { count: 8, channels: [8; MAX_CHANNELS], flags: 0, rssi: 1 },
            0,
        );

        let radio = TaranisX9DPlus::from(&set);
        assert_eq!(radio.left_x.raw(), 8);
        assert!(radio.si, "centered channel 10 reads as on");
    }

    #[test]
    fn test_display() {
        let line = TaranisX9DPlus::default().to_string();
        assert!(line.starts_with("left=(0.00,0.00)"));
        assert!(line.contains("sa=1"));
        assert!(line.ends_with("si=0"));
    }
}
