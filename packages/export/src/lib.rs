#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CSV persistence sink.
//!
//! Implements the engine's [`TelemetrySink`] by appending telemetry rows
//! to `terminal_data.csv` and transmission status flips to
//! `status_log.csv` under a data directory. Files are opened in append
//! mode so restarts extend the log; headers are written only when a file
//! is created fresh.
//!
//! Runs on the engine publisher's drain thread; per-row failures are
//! reported back to the publisher, which logs and drops the row.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use terminal_map_engine::{PositionRow, SinkResult, StatusRow, TelemetrySink};
use thiserror::Error;

/// Telemetry rows file name.
pub const TELEMETRY_FILE: &str = "terminal_data.csv";

/// Status flip file name.
pub const STATUS_FILE: &str = "status_log.csv";

/// Errors that can occur while opening the CSV sink.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Creating the data directory or opening a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a CSV header failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Appending CSV sink for telemetry and status rows.
pub struct CsvSink {
    telemetry: csv::Writer<File>,
    status: csv::Writer<File>,
}

impl CsvSink {
    /// Opens (or creates) the CSV files under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the directory cannot be created or a
    /// file cannot be opened.
    pub fn open(data_dir: &Path) -> Result<Self, ExportError> {
        std::fs::create_dir_all(data_dir)?;

        let telemetry = open_appending(
            &data_dir.join(TELEMETRY_FILE),
            &[
                "timestamp",
                "deviceId",
                "latitude",
                "longitude",
                "district",
                "state",
                "status",
            ],
        )?;
        let status = open_appending(
            &data_dir.join(STATUS_FILE),
            &["timestamp", "deviceId", "status"],
        )?;

        log::info!("CSV sink writing to {}", data_dir.display());
        Ok(Self { telemetry, status })
    }
}

impl TelemetrySink for CsvSink {
    fn record_position(&mut self, row: &PositionRow) -> SinkResult {
        self.telemetry.serialize(row)?;
        self.telemetry.flush()?;
        Ok(())
    }

    fn record_status(&mut self, row: &StatusRow) -> SinkResult {
        self.status.serialize(row)?;
        self.status.flush()?;
        Ok(())
    }
}

/// Opens a CSV file for appending, writing the header only when the file
/// is empty.
fn open_appending(path: &PathBuf, header: &[&str]) -> Result<csv::Writer<File>, ExportError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_fresh = file.metadata()?.len() == 0;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if is_fresh {
        writer.write_record(header)?;
        writer.flush()?;
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use terminal_map_telemetry_models::TransmissionStatus;

    fn temp_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "terminal_map_export_{test}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn sample_position() -> PositionRow {
        PositionRow {
            timestamp: Utc.with_ymd_and_hms(2024, 4, 5, 12, 30, 0).unwrap(),
            device_id: "1712328952086-29105A0".to_string(),
            latitude: 18.52,
            longitude: 73.85,
            district: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            status: TransmissionStatus::Disabled,
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = temp_dir("rows");
        let mut sink = CsvSink::open(&dir).unwrap();
        sink.record_position(&sample_position()).unwrap();
        sink.record_status(&StatusRow {
            timestamp: Utc.with_ymd_and_hms(2024, 4, 5, 12, 30, 0).unwrap(),
            device_id: "1712328952086-29105A0".to_string(),
            status: TransmissionStatus::Disabled,
        })
        .unwrap();

        let telemetry = std::fs::read_to_string(dir.join(TELEMETRY_FILE)).unwrap();
        let mut lines = telemetry.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,deviceId,latitude,longitude,district,state,status"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("1712328952086-29105A0"));
        assert!(row.contains("Pune"));
        assert!(row.contains("DISABLED"));

        let status = std::fs::read_to_string(dir.join(STATUS_FILE)).unwrap();
        assert_eq!(status.lines().next().unwrap(), "timestamp,deviceId,status");
        assert_eq!(status.lines().count(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopening_appends_without_duplicate_header() {
        let dir = temp_dir("reopen");
        {
            let mut sink = CsvSink::open(&dir).unwrap();
            sink.record_position(&sample_position()).unwrap();
        }
        {
            let mut sink = CsvSink::open(&dir).unwrap();
            sink.record_position(&sample_position()).unwrap();
        }

        let telemetry = std::fs::read_to_string(dir.join(TELEMETRY_FILE)).unwrap();
        let header_count = telemetry
            .lines()
            .filter(|line| line.starts_with("timestamp,"))
            .count();
        assert_eq!(header_count, 1);
        assert_eq!(telemetry.lines().count(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
