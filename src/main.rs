//! # FBus Receiver
//!
//! Reads control channels from an FrSky FBus receiver and answers its
//! telemetry polls.
//!
//! Usage: `fbus-receiver [CONFIG]` (default `config/default.toml`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use fbus_receiver::channels::ChannelSet;
use fbus_receiver::clock::{Clock, MonotonicClock};
use fbus_receiver::config::{Config, LoggingConfig, RecorderConfig};
use fbus_receiver::error::ReceiverError;
use fbus_receiver::link::serial::SerialLink;
use fbus_receiver::mapping::TaranisX9DPlus;
use fbus_receiver::receiver::{ChannelConsumer, EngineTiming, Receiver, ReceiverStats};
use fbus_receiver::recorder::FrameRecorder;
use fbus_receiver::telemetry::{RoundRobin, TelemetryItem};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
///
/// Log lines go through a background writer so formatting and stdout I/O
/// stay off the protocol thread. Keep the returned guard alive until exit.
fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_thread_names(true)
        .init();

    guard
}

/// Telemetry slots reported back to the transmitter, one per answered poll
fn telemetry_slots(stats: Arc<ReceiverStats>) -> RoundRobin {
    let frames = Arc::clone(&stats);

    RoundRobin::new()
        .with_slot(move || TelemetryItem::diy(0, frames.control_frames() as i32))
        .with_slot(move || TelemetryItem::diy(1, stats.snapshot().telemetry_skipped as i32))
}

/// Map every channel set onto the transmitter's controls and optionally record it
fn channel_consumer(config: &RecorderConfig) -> Result<impl ChannelConsumer> {
    let mut recorder = if config.enabled {
        Some(FrameRecorder::create(config).context("Failed to open frame recorder")?)
    } else {
        None
    };
    let mut radio = TaranisX9DPlus::new();

    Ok(move |set: ChannelSet| {
        radio.set(&set);
        debug!("CTRL: {}", radio);

        if let Some(recorder) = recorder.as_mut() {
            recorder.on_control_frame(set);
        }
    })
}

/// Main entry point for the FBus receiver
///
/// # Control Flow
///
/// 1. Load configuration and set up logging
/// 2. Open the serial port and start the protocol thread and consumer task
/// 3. Log receiver statistics every `stats_interval_ms` until Ctrl+C or
///    until the serial port goes away
///
/// # Errors
///
/// Returns error if the configuration is invalid, the serial port cannot be
/// opened or the protocol thread fails for a reason other than the port
/// closing.
#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let _log_guard = init_logging(&config.logging);
    info!("FBus receiver v{} starting...", env!("CARGO_PKG_VERSION"));

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let (serial, link) = SerialLink::open(&config.serial, Arc::clone(&clock))?;

    let stats = Arc::new(ReceiverStats::new());
    let receiver = Receiver::start(
        link,
        telemetry_slots(Arc::clone(&stats)),
        channel_consumer(&config.recorder)?,
        clock,
        EngineTiming::from(&config.protocol),
        Arc::clone(&stats),
    )?;

    info!("Press Ctrl+C to exit");

    let mut stats_interval = interval(Duration::from_millis(config.logging.stats_interval_ms));
    stats_interval.tick().await;

    loop {
        tokio::select! {
            _ = stats_interval.tick() => {
                info!(
                    "Receiver: {}  link: {}  rssi: {}  overruns: {}",
                    receiver.stats(),
                    if receiver.connected() { "up" } else { "down" },
                    receiver.rssi(),
                    serial.overruns(),
                );

                if receiver.is_finished() {
                    warn!("Protocol thread exited");
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    serial.close();
    match receiver.join().await {
        Ok(()) | Err(ReceiverError::LinkClosed) => {}
        Err(e) => return Err(e.into()),
    }

    info!("Final stats: {}", stats.snapshot());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbus_receiver::telemetry::TelemetrySource;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.serial.baud_rate, 460800);
        assert!(!config.recorder.enabled);
    }

    #[test]
    fn test_telemetry_slots_rotate() {
        let stats = Arc::new(ReceiverStats::new());
        let mut slots = telemetry_slots(stats);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots.next_telemetry().app_id, 0x5100);
        assert_eq!(slots.next_telemetry().app_id, 0x5101);
        assert_eq!(slots.next_telemetry().app_id, 0x5100);
    }

    #[test]
    fn test_consumer_without_recorder() {
        let mut consumer = channel_consumer(&RecorderConfig::default()).unwrap();
        consumer.on_control_frame(ChannelSet::default());
    }
}
