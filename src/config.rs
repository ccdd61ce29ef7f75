//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{ReceiverError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Protocol timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolConfig {
    /// Time without a valid control frame before the link is marked lost
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,

    /// Latest telemetry reply time after the poll's last byte
    #[serde(default = "default_uplink_deadline_us")]
    pub uplink_deadline_us: u64,
}

/// Frame recorder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecorderConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_recorder_path")]
    pub path: String,

    #[serde(default = "default_every_n_frames")]
    pub every_n_frames: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyAMA0".to_string() }
fn default_baud_rate() -> u32 { 460800 }
fn default_timeout_ms() -> u64 { 100 }

fn default_sync_timeout_ms() -> u64 { crate::fbus::protocol::DEFAULT_SYNC_TIMEOUT_MS }
fn default_uplink_deadline_us() -> u64 { crate::fbus::protocol::DEFAULT_UPLINK_DEADLINE_US }

fn default_recorder_path() -> String { "./logs/frames.jsonl".to_string() }
fn default_every_n_frames() -> u64 { 10 }

fn default_log_level() -> String { "info".to_string() }
fn default_stats_interval_ms() -> u64 { 5000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: default_sync_timeout_ms(),
            uplink_deadline_us: default_uplink_deadline_us(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_recorder_path(),
            every_n_frames: default_every_n_frames(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

const VALID_BAUD_RATES: &[u32] = &[115200, 460800];
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn invalid(msg: &str) -> ReceiverError {
    ReceiverError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields take their defaults.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fbus_receiver::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Serial port
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !VALID_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be 115200 or 460800"));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        // Protocol timing
        if self.protocol.sync_timeout_ms == 0 || self.protocol.sync_timeout_ms > 10000 {
            return Err(invalid("sync_timeout_ms must be between 1 and 10000"));
        }

        if self.protocol.uplink_deadline_us == 0 || self.protocol.uplink_deadline_us > 10000 {
            return Err(invalid("uplink_deadline_us must be between 1 and 10000"));
        }

        // Recorder
        if self.recorder.enabled && self.recorder.path.is_empty() {
            return Err(invalid("recorder path cannot be empty when enabled"));
        }

        if self.recorder.every_n_frames == 0 {
            return Err(invalid("every_n_frames must be greater than 0"));
        }

        // Logging
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of trace, debug, info, warn, error"));
        }

        if self.logging.stats_interval_ms < 100 || self.logging.stats_interval_ms > 600000 {
            return Err(invalid("stats_interval_ms must be between 100 and 600000"));
        }

        Ok(())
    }
}
