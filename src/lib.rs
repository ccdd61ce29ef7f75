//! # FBus Receiver Library
//!
//! FrSky FBus receiver protocol engine with S.Port telemetry replies.
//!
//! This library decodes the serial byte stream of an FBus RC receiver into
//! control-channel values and answers the receiver's telemetry polls inside
//! the reply window of the half-duplex line.

pub mod channels;
pub mod clock;
pub mod config;
pub mod error;
pub mod fbus;
pub mod link;
pub mod mapping;
pub mod receiver;
pub mod recorder;
pub mod telemetry;
