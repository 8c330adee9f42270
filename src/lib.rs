//! isocam: camera capture core with recording and per-frame ISO telemetry
//!
//! The crate drives an exclusive camera device through three modes (idle,
//! previewing, recording). While recording, the sensor sensitivity of every
//! completed frame is appended to a per-activation CSV log, next to an MP4
//! recording of the same frames.
//!
//! # Features
//! - Single-worker session state machine, explicit sink sets per mode
//! - Pluggable camera backends (a synthetic one is built in)
//! - MPEG-4/H.264 recording sink (`recording` feature)
//! - Per-activation telemetry CSV log
//!
//! # Usage
//! ```rust,ignore
//! use isocam::{activation_parts, CaptureHandle, IsoCamConfig};
//! use isocam::platform::{CountingSurface, SyntheticCamera, SyntheticConfig};
//! use isocam::recording::Mp4RecordingSink;
//! use std::sync::Arc;
//!
//! let config = IsoCamConfig::load_or_default();
//! let camera = SyntheticCamera::new(SyntheticConfig::from_config(&config));
//! let parts = activation_parts(&config, Box::new(camera), Box::new(Mp4RecordingSink::new()));
//! let mut capture = CaptureHandle::spawn(parts)?;
//! capture.on_surface_ready(Arc::new(CountingSurface::new("preview")))?;
//! capture.on_permission_granted()?;
//! capture.on_start_recording()?;
//! ```
pub mod config;
pub mod errors;
pub mod permissions;
pub mod platform;
pub mod recording;
pub mod session;
pub mod telemetry;
pub mod timing;
pub mod types;

// Testing utilities - scripted hardware and synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::IsoCamConfig;
pub use errors::{CaptureError, ErrorKind};
pub use permissions::PermissionStatus;
pub use session::{CaptureHandle, SessionEvent, SessionParts, StatusSnapshot};
pub use types::{CaptureMode, SinkSet, TelemetrySample};

use platform::CameraBackend;
use recording::RecordingSink;
use std::sync::Arc;
use timing::SystemClock;

/// Assemble the collaborators of one activation from `config`.
///
/// Opens the activation's telemetry log (header included) right away, in
/// the configured output directory.
pub fn activation_parts(
    config: &IsoCamConfig,
    backend: Box<dyn CameraBackend>,
    recorder: Box<dyn RecordingSink>,
) -> SessionParts {
    let telemetry = telemetry::open_activation_log(
        &config.output_directory(),
        &config.telemetry,
        chrono::Local::now(),
    );
    SessionParts {
        device_id: config.camera.device_id.clone(),
        backend,
        recorder,
        telemetry,
        clock: Arc::new(SystemClock),
        recording_path: config.recording_path(),
        video_params: config.video_params(),
    }
}

/// Initialize logging for the capture core
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "isocam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        recording: cfg!(feature = "recording"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether the MP4 recording sink is compiled in
    pub recording: bool,
}
