//! # Telemetry Module
//!
//! Telemetry items sent back to the transmitter in uplink replies.
//!
//! This module handles:
//! - The [`TelemetryItem`] carried by one uplink frame
//! - The [`TelemetrySource`] interface polled once per answered downlink
//! - FrSky S.Port application ids and value scaling
//! - Round-robin selection across registered sensor slots

pub mod app_id;
pub mod provider;

pub use provider::RoundRobin;

use app_id::*;

/// One telemetry value as carried by an uplink frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryItem {
    /// Sensor application id
    pub app_id: u16,

    /// Sensor value
    pub data: u32,
}

impl TelemetryItem {
    /// Empty item sent when no sensor has anything to report
    pub const fn null() -> Self {
        Self { app_id: 0x0000, data: 0x0000_0000 }
    }

    /// Temperature sensor 1 in °C
    pub fn temperature1(offset: u8, temp_c: u32) -> Self {
        Self { app_id: T1_FIRST_ID + offset as u16, data: temp_c }
    }

    /// Temperature sensor 2 in °C
    pub fn temperature2(offset: u8, temp_c: u32) -> Self {
        Self { app_id: T2_FIRST_ID + offset as u16, data: temp_c }
    }

    /// Two lipo cell voltages of one battery
    ///
    /// Layout: `cell0[31:20] | cell1[19:8] | n_cells[7:4] | battery_id[3:0]`,
    /// cell voltages in 1/500 V.
    pub fn cells(battery_id: u8, offset: u8, n_cells: u8, voltage0: f32, voltage1: f32) -> Self {
        let cv0 = (voltage0 * 500.0) as u32;
        let cv1 = (voltage1 * 500.0) as u32;
        let data = (cv0 & 0x0FFF) << 20
            | (cv1 & 0x0FFF) << 8
            | ((n_cells as u32) & 0x0F) << 4
            | (battery_id as u32) & 0x0F;

        Self { app_id: CELLS_FIRST_ID + offset as u16, data }
    }

    /// Analog input A3 in volts (sent in 1/100 V)
    pub fn a3(offset: u8, voltage: f32) -> Self {
        Self { app_id: A3_FIRST_ID + offset as u16, data: (voltage * 100.0 + 0.5) as u32 }
    }

    /// Analog input A4 in volts (sent in 1/100 V)
    pub fn a4(offset: u8, voltage: f32) -> Self {
        Self { app_id: A4_FIRST_ID + offset as u16, data: (voltage * 100.0 + 0.5) as u32 }
    }

    /// Current in amperes (sent in 1/10 A)
    pub fn current(offset: u8, current: f32) -> Self {
        Self { app_id: CURR_FIRST_ID + offset as u16, data: (current * 10.0 + 0.5) as u32 }
    }

    /// Rotational speed (sent in 1/10 rpm, two's complement)
    pub fn rpm(offset: u8, rpm: f32) -> Self {
        let value = (10.0 * rpm + 0.5) as i32;
        Self { app_id: RPM_FIRST_ID + offset as u16, data: value as u32 }
    }

    /// Switching BEC: current in the high half-word, mV in the low one
    pub fn sbec(offset: u8, voltage: f32, current: f32) -> Self {
        let mv = (voltage * 1000.0 + 0.5) as u16;
        let data = (current as u16 as u32) << 16 | mv as u32;
        Self { app_id: SBEC_POWER_FIRST_ID + offset as u16, data }
    }

    /// Free-form integer value in the DIY range
    pub fn diy(offset: u16, value: i32) -> Self {
        Self { app_id: DIY_FIRST_ID + offset, data: value as u32 }
    }

    /// Free-form value in the DIY range with one decimal (sent ×10)
    pub fn diy_float(offset: u16, value: f32) -> Self {
        Self::diy(offset, (10.0 * value + 0.5) as i32)
    }
}

/// Supplies the next telemetry item for an uplink reply
///
/// Called from inside the reply deadline window, so implementations must
/// return promptly and never block.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySource: Send {
    fn next_telemetry(&mut self) -> TelemetryItem;
}

impl<F> TelemetrySource for F
where
    F: FnMut() -> TelemetryItem + Send,
{
    fn next_telemetry(&mut self) -> TelemetryItem {
        self()
    }
}
