//! FrSky S.Port sensor application ids.
//!
//! Each sensor class owns a block of 16 ids; the offset within the block
//! selects the sensor instance.

pub const ALT_FIRST_ID: u16 = 0x0100;
pub const VARIO_FIRST_ID: u16 = 0x0110;
pub const CURR_FIRST_ID: u16 = 0x0200;
pub const VFAS_FIRST_ID: u16 = 0x0210;
pub const CELLS_FIRST_ID: u16 = 0x0300;
pub const T1_FIRST_ID: u16 = 0x0400;
pub const T2_FIRST_ID: u16 = 0x0410;
pub const RPM_FIRST_ID: u16 = 0x0500;
pub const FUEL_FIRST_ID: u16 = 0x0600;
pub const ACCX_FIRST_ID: u16 = 0x0700;
pub const ACCY_FIRST_ID: u16 = 0x0710;
pub const ACCZ_FIRST_ID: u16 = 0x0720;
pub const GPS_LONG_LATI_FIRST_ID: u16 = 0x0800;
pub const GPS_ALT_FIRST_ID: u16 = 0x0820;
pub const GPS_SPEED_FIRST_ID: u16 = 0x0830;
pub const GPS_COURS_FIRST_ID: u16 = 0x0840;
pub const A3_FIRST_ID: u16 = 0x0900;
pub const A4_FIRST_ID: u16 = 0x0910;
pub const AIR_SPEED_FIRST_ID: u16 = 0x0A00;
pub const SBEC_POWER_FIRST_ID: u16 = 0x0E50;

/// Free-form sensor range (0x5100..=0x52FF)
pub const DIY_FIRST_ID: u16 = 0x5100;
pub const DIY_LAST_ID: u16 = 0x52FF;

pub const RSSI_ID: u16 = 0xF101;
pub const BATT_ID: u16 = 0xF104;
