//! Telemetry sinks for per-frame sensor gain readings
//!
//! A telemetry sink is append-only and single-writer: only the session
//! worker ever calls [`TelemetrySink::record`].

mod csv;

pub use csv::{CsvTelemetryLog, LOG_HEADER};

use crate::config::TelemetryConfig;
use crate::errors::CaptureError;
use crate::types::TelemetrySample;
use chrono::{DateTime, Local};
use std::path::Path;

/// Append-only consumer of timestamped telemetry values
pub trait TelemetrySink: Send {
    /// Persist one sample. Samples arrive in capture completion order.
    fn record(&mut self, sample: TelemetrySample) -> Result<(), CaptureError>;

    /// Flush and release the underlying resource. Further records are errors.
    fn close(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Location of the persisted log, if any
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Sink that drops every sample
///
/// Used when the log file cannot be opened at activation: telemetry loss is
/// acceptable, preview and recording continue.
#[derive(Debug, Default)]
pub struct NullTelemetry {
    dropped: u64,
}

impl NullTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TelemetrySink for NullTelemetry {
    fn record(&mut self, _sample: TelemetrySample) -> Result<(), CaptureError> {
        self.dropped += 1;
        Ok(())
    }
}

/// Open the CSV log for an activation started at `started_at`.
///
/// Falls back to [`NullTelemetry`] when the file cannot be created, so a
/// missing log never blocks preview or recording.
pub fn open_activation_log(
    dir: &Path,
    config: &TelemetryConfig,
    started_at: DateTime<Local>,
) -> Box<dyn TelemetrySink> {
    match CsvTelemetryLog::create(dir, &config.file_prefix, &config.timestamp_format, started_at) {
        Ok(log) => Box::new(log),
        Err(e) => {
            log::warn!("Telemetry log unavailable in {:?}: {}", dir, e);
            Box::new(NullTelemetry::new())
        }
    }
}
