use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the capture core.
///
/// None of these terminate the session worker; each one is turned into a
/// mode decision plus a diagnostic event at the callback boundary.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Device access error: {0}")]
    DeviceAccess(String),
    #[error("Session configuration failed: {0}")]
    ConfigureFailed(String),
    #[error("Recording sink prepare failed: {0}")]
    Prepare(String),
    #[error("Recording sink start failed: {0}")]
    SinkStart(String),
    #[error("Recording sink stop failed: {0}")]
    SinkStop(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not ready: {0}")]
    NotReady(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Capture worker is not running")]
    WorkerGone,
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CaptureError::DeviceAccess(_) => ErrorKind::DeviceAccess,
            CaptureError::ConfigureFailed(_) => ErrorKind::ConfigureFailed,
            CaptureError::Prepare(_) => ErrorKind::Prepare,
            CaptureError::SinkStart(_) => ErrorKind::SinkStart,
            CaptureError::SinkStop(_) => ErrorKind::SinkStop,
            CaptureError::Encoding(_) => ErrorKind::Encoding,
            CaptureError::Io(_) => ErrorKind::Io,
            CaptureError::NotReady(_) => ErrorKind::NotReady,
            CaptureError::Config(_) => ErrorKind::Config,
            CaptureError::WorkerGone => ErrorKind::WorkerGone,
        }
    }
}

/// Cloneable discriminant of [`CaptureError`], carried by diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceAccess,
    ConfigureFailed,
    Prepare,
    SinkStart,
    SinkStop,
    Encoding,
    Io,
    NotReady,
    Config,
    WorkerGone,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::DeviceAccess => "device_access",
            ErrorKind::ConfigureFailed => "configure_failed",
            ErrorKind::Prepare => "prepare",
            ErrorKind::SinkStart => "sink_start",
            ErrorKind::SinkStop => "sink_stop",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Io => "io",
            ErrorKind::NotReady => "not_ready",
            ErrorKind::Config => "config",
            ErrorKind::WorkerGone => "worker_gone",
        };
        write!(f, "{s}")
    }
}

/// Errors returned synchronously by hardware trait methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// The device was revoked or closed underneath the call.
    #[error("camera access error: {0}")]
    Access(String),
    #[error("device is closed")]
    Closed,
    #[error("hardware error code {0}")]
    Code(i32),
}

impl From<HardwareError> for CaptureError {
    fn from(error: HardwareError) -> Self {
        CaptureError::DeviceAccess(error.to_string())
    }
}
