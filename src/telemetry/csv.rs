//! CSV telemetry log, one file per activation

use super::TelemetrySink;
use crate::errors::CaptureError;
use crate::types::TelemetrySample;
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LOG_HEADER: &str = "Timestamp,ISO";

/// Append-only `timestamp,iso` log flushed after every line
pub struct CsvTelemetryLog {
    path: PathBuf,
    writer: Option<File>,
    lines: u64,
}

impl CsvTelemetryLog {
    /// Create the log for an activation started at `started_at`.
    ///
    /// The file is `<dir>/<prefix><started_at formatted>.csv`, opened in
    /// append mode, and the header is written immediately.
    pub fn create(
        dir: impl AsRef<Path>,
        prefix: &str,
        timestamp_format: &str,
        started_at: DateTime<Local>,
    ) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let mut name = String::from(prefix);
        write!(name, "{}.csv", started_at.format(timestamp_format)).map_err(|_| {
            CaptureError::Config(format!("Invalid log timestamp format: {}", timestamp_format))
        })?;
        fs::create_dir_all(dir)?;
        Self::open(dir.join(name))
    }

    /// Open `path` in append mode and write the header line
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let path = path.into();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", LOG_HEADER)?;
        file.flush()?;
        log::info!("Telemetry log opened at {:?}", path);

        Ok(Self {
            path,
            writer: Some(file),
            lines: 0,
        })
    }

    /// Number of sample lines written so far
    pub fn lines(&self) -> u64 {
        self.lines
    }
}

impl TelemetrySink for CsvTelemetryLog {
    fn record(&mut self, sample: TelemetrySample) -> Result<(), CaptureError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "telemetry log is closed",
            ))
        })?;

        log::debug!("Logging ISO {} at {}", sample.value, sample.timestamp_ms);
        writeln!(writer, "{},{}", sample.timestamp_ms, sample.value)?;
        writer.flush()?;
        self.lines += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            log::info!("Telemetry log closed after {} samples", self.lines);
        }
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

impl Drop for CsvTelemetryLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Error closing telemetry log in drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_named_after_activation_start() {
        let dir = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let log = CsvTelemetryLog::create(dir.path(), "ISO_Log_", "%Y%m%d_%H%M%S", started)
            .unwrap();
        assert_eq!(
            log.path().unwrap().file_name().unwrap(),
            "ISO_Log_20240309_140507.csv"
        );
    }

    #[test]
    fn test_invalid_timestamp_format_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CsvTelemetryLog::create(dir.path(), "ISO_Log_", "%Y%Q", Local::now());
        assert!(matches!(result, Err(CaptureError::Config(_))));
    }

    #[test]
    fn test_header_then_lines_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iso.csv");
        let mut log = CsvTelemetryLog::open(&path).unwrap();

        log.record(TelemetrySample::new(1_700_000_000_000, 100)).unwrap();
        log.record(TelemetrySample::new(1_700_000_000_033, 110)).unwrap();

        // Readable before close: every write is flushed.
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Timestamp,ISO\n1700000000000,100\n1700000000033,110\n"
        );
        assert_eq!(log.lines(), 2);
    }

    #[test]
    fn test_record_after_close_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CsvTelemetryLog::open(dir.path().join("iso.csv")).unwrap();
        log.close().unwrap();
        log.close().unwrap();
        let err = log.record(TelemetrySample::new(1, 1)).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}
