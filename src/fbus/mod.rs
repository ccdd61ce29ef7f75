//! # FBus Protocol Module
//!
//! Wire format of the FrSky FBus receiver link.
//!
//! This module handles:
//! - Control frame decoding (8, 16 or 24 channels, 11-bit resolution)
//! - Downlink poll decoding and uplink telemetry reply encoding
//! - The end-around-carry checksum shared by all frames

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
