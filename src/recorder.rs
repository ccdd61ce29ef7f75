//! # Frame Recorder
//!
//! Writes decoded channel sets to a JSON Lines file for offline analysis.
//!
//! One record is written every `every_n_frames` control frames; link state
//! changes (up to lost and back) are always recorded.
//!
//! ## Record Format
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.000Z","seq":42,"sync":true,"connected":true,
//!  "failsafe":false,"rssi":100,"flags":0,"channels":[992,992,...]}
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::channels::{ChannelSet, ChannelValue, LinkFlags};
use crate::config::RecorderConfig;
use crate::error::Result;
use crate::receiver::ChannelConsumer;

#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    timestamp: DateTime<Utc>,
    seq: u32,
    sync: bool,
    connected: bool,
    failsafe: bool,
    rssi: u8,
    flags: LinkFlags,
    channels: &'a [ChannelValue],
}

impl<'a> FrameRecord<'a> {
    fn new(set: &'a ChannelSet) -> Self {
        Self {
            timestamp: Utc::now(),
            seq: set.seq(),
            sync: set.sync(),
            connected: set.connected(),
            failsafe: set.flags().failsafe(),
            rssi: set.rssi(),
            flags: set.flags(),
            channels: set.channels(),
        }
    }
}

/// JSON Lines writer for channel sets
#[derive(Debug)]
pub struct FrameRecorder<W: Write> {
    writer: W,
    every_n_frames: u64,
    seen: u64,
    written: u64,
    last_connected: Option<bool>,
}

impl FrameRecorder<BufWriter<File>> {
    /// Open (append) the configured file, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn create(config: &RecorderConfig) -> Result<Self> {
        let path = Path::new(&config.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Recording every {} frames to {}", config.every_n_frames, path.display());

        Ok(Self::new(BufWriter::new(file), config.every_n_frames))
    }
}

impl<W: Write> FrameRecorder<W> {
    pub fn new(writer: W, every_n_frames: u64) -> Self {
        Self {
            writer,
            every_n_frames: every_n_frames.max(1),
            seen: 0,
            written: 0,
            last_connected: None,
        }
    }

    /// Record `set` if it is due or the link state changed
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A record was written
    /// * `Ok(false)` - The set was skipped
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn record(&mut self, set: &ChannelSet) -> Result<bool> {
        let connected = set.connected();
        let state_changed = self.last_connected != Some(connected);
        let due = self.seen % self.every_n_frames == 0;
        self.seen += 1;
        self.last_connected = Some(connected);

        if !due && !state_changed {
            return Ok(false);
        }

        serde_json::to_writer(&mut self.writer, &FrameRecord::new(set))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;

        Ok(true)
    }

    /// Number of records written
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ChannelConsumer for FrameRecorder<W> {
    fn on_control_frame(&mut self, channels: ChannelSet) {
        if let Err(e) = self.record(&channels) {
            warn!("Failed to record frame: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbus::protocol::{ControlFrame, MAX_CHANNELS};
    use std::io::Read;

    fn decoded(seq: u32, flags: u8) -> ChannelSet {
        let mut set = ChannelSet::default();
        set.apply_control(
            &ControlFrame { count: 8, channels: [1200; MAX_CHANNELS], flags, rssi: 88 },
            seq,
        );
        set
    }

    fn lines(buf: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_record_fields() {
        let mut recorder = FrameRecorder::new(Vec::new(), 1);
        assert!(recorder.record(&decoded(7, 0x08)).unwrap());

        let records = lines(&recorder.into_inner());
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record["seq"], 7);
        assert_eq!(record["rssi"], 88);
        assert_eq!(record["flags"], 8);
        assert_eq!(record["failsafe"], true);
        assert_eq!(record["connected"], true);
        assert_eq!(record["sync"], true);
        assert_eq!(record["channels"].as_array().unwrap().len(), 8);
        assert_eq!(record["channels"][0], 1200);
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn test_every_n_frames() {
        let mut recorder = FrameRecorder::new(Vec::new(), 3);
        let written: Vec<bool> = (0..7)
            .map(|seq| recorder.record(&decoded(seq, 0)).unwrap())
            .collect();

        assert_eq!(written, vec![true, false, false, true, false, false, true]);
        assert_eq!(recorder.written(), 3);
    }

    #[test]
    fn test_link_state_change_is_always_recorded() {
        let mut recorder = FrameRecorder::new(Vec::new(), 100);
        assert!(recorder.record(&decoded(0, 0)).unwrap());
        assert!(!recorder.record(&decoded(1, 0)).unwrap());

        let mut lost = decoded(1, 0);
        lost.mark_lost();
        assert!(recorder.record(&lost).unwrap());
        assert!(!recorder.record(&lost).unwrap());

        assert!(recorder.record(&decoded(2, 0)).unwrap());

        let records = lines(&recorder.into_inner());
        let connected: Vec<bool> = records.iter().map(|r| r["connected"].as_bool().unwrap()).collect();
        assert_eq!(connected, vec![true, false, true]);
    }

    #[test]
    fn test_create_writes_jsonl_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("frames.jsonl");
        let config = RecorderConfig {
            enabled: true,
            path: path.to_string_lossy().into_owned(),
            every_n_frames: 1,
        };

        {
            let mut recorder = FrameRecorder::create(&config).unwrap();
            recorder.on_control_frame(decoded(0, 0));
            recorder.on_control_frame(decoded(1, 0));
        }

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_create_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.jsonl");
        let config = RecorderConfig {
            enabled: true,
            path: path.to_string_lossy().into_owned(),
            every_n_frames: 1,
        };

        for seq in 0..2 {
            let mut recorder = FrameRecorder::create(&config).unwrap();
            recorder.on_control_frame(decoded(seq, 0));
        }

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
