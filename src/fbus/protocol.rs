//! # FBus Protocol Constants and Types
//!
//! Core wire definitions for the FrSky FBus receiver link.
//!
//! ## Control frame (receiver → device)
//!
//! ```text
//! |<SIZE>|<0xFF>|<CHANNEL DATA>|<FLAGS>|<RSSI>|<CRC>|
//! ```
//!
//! ## Downlink poll / uplink reply (bidirectional, 10 bytes)
//!
//! ```text
//! |<0x08>|<ID>|<PRIM>|<APP_ID u16 LE>|<DATA u32 LE>|<CRC>|
//! ```

use thiserror::Error;

/// Second byte of every control frame
pub const FBUS_CONTROL_HDR: u8 = 0xFF;

/// Size byte of an 8 channel control frame
pub const FBUS_CONTROL_8CH_SIZE: u8 = 0x0D;

/// Size byte of a 16 channel control frame
pub const FBUS_CONTROL_16CH_SIZE: u8 = 0x18;

/// Size byte of a 24 channel control frame
pub const FBUS_CONTROL_24CH_SIZE: u8 = 0x23;

/// Size + header byte
pub const FBUS_CONTROL_HDR_SIZE: usize = 2;

/// Packed bytes carrying one group of 8 channels (8 × 11 bits)
pub const FBUS_CONTROL_8_VALUE_SIZE: usize = 11;

/// Largest control frame on the wire (24 channels)
pub const FBUS_CONTROL_MAX_FRAME_SIZE: usize = FBUS_CONTROL_24CH_SIZE as usize + 3;

/// Size byte of downlink and uplink frames
pub const FBUS_DOWNLINK_HDR: u8 = 0x08;

/// Uplink frames share the downlink layout
pub const FBUS_UPLINK_HDR: u8 = FBUS_DOWNLINK_HDR;

/// Bytes before the checksummed region of a downlink/uplink frame
pub const FBUS_DOWNLINK_HDR_SIZE: usize = 1;

/// Total downlink/uplink frame length
pub const FBUS_DOWNLINK_SIZE: usize = FBUS_DOWNLINK_HDR_SIZE + FBUS_DOWNLINK_HDR as usize + 1;

/// Total uplink frame length
pub const FBUS_UPLINK_SIZE: usize = FBUS_DOWNLINK_SIZE;

/// Primitive marking an uplink data frame
pub const FBUS_UPLINK_DATA_FRAME: u8 = 0x10;

/// Physical id this device answers polls for
pub const RECEIVER_ID: u8 = 0x67;

/// Maximum number of channels in one control frame
pub const MAX_CHANNELS: usize = 24;

/// Default latest reply time after the last received byte
pub const DEFAULT_UPLINK_DEADLINE_US: u64 = 2_500;

/// Default time without a valid control frame before the link is declared lost
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 100;

/// Why a byte slice is not (yet) a valid frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// More bytes are needed before the frame can be judged
    #[error("incomplete frame: need {needed} bytes")]
    Incomplete { needed: usize },

    /// Header byte does not match the expected frame type
    #[error("invalid header byte 0x{0:02X}")]
    BadHeader(u8),

    /// Size byte is not one of the known frame sizes
    #[error("invalid size byte 0x{0:02X}")]
    BadSize(u8),

    /// Trailing checksum does not match the frame body
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    Checksum { expected: u8, actual: u8 },
}

/// Number of channels carried by a control frame with the given size byte
pub fn control_channel_count(size: u8) -> Option<usize> {
    match size {
        FBUS_CONTROL_8CH_SIZE => Some(8),
        FBUS_CONTROL_16CH_SIZE => Some(16),
        FBUS_CONTROL_24CH_SIZE => Some(24),
        _ => None,
    }
}

/// Size byte announcing a control frame with `count` channels
pub fn control_size_for(count: usize) -> Option<u8> {
    match count {
        8 => Some(FBUS_CONTROL_8CH_SIZE),
        16 => Some(FBUS_CONTROL_16CH_SIZE),
        24 => Some(FBUS_CONTROL_24CH_SIZE),
        _ => None,
    }
}

/// Total wire length of a control frame with the given size byte
pub fn control_frame_len(size: u8) -> usize {
    FBUS_CONTROL_HDR_SIZE + size as usize + 1
}

/// Decoded control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    /// Number of valid entries in `channels` (8, 16 or 24)
    pub count: usize,

    /// Raw 11-bit channel values
    pub channels: [u16; MAX_CHANNELS],

    /// Link flags byte
    pub flags: u8,

    /// Received signal strength
    pub rssi: u8,
}

/// Decoded downlink poll or uplink reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SportFrame {
    /// Physical id of the addressed device
    pub id: u8,

    /// Frame primitive
    pub prim: u8,

    /// Sensor application id
    pub app_id: u16,

    /// Sensor value
    pub data: u32,
}

impl SportFrame {
    /// Whether this poll is addressed to this device
    pub fn is_for_us(&self) -> bool {
        self.id == RECEIVER_ID
    }
}
