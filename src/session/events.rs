//! Outbound notifications: mode changes, diagnostics and status snapshots

use crate::errors::{CaptureError, ErrorKind};
use crate::permissions::PermissionStatus;
use crate::types::{CaptureMode, SinkSet};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// A failure converted into a mode decision, reported for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CaptureError> for Diagnostic {
    fn from(error: &CaptureError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Events emitted by the session worker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ModeChanged {
        mode: CaptureMode,
        /// Epoch millis at which the recorder started, while recording
        recording_since_ms: Option<i64>,
    },
    DeviceOpened {
        device_id: String,
    },
    DeviceClosed {
        device_id: String,
    },
    Diagnostic(Diagnostic),
    ShutDown,
}

/// Read-only view of the session state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub activation_id: Uuid,
    pub mode: CaptureMode,
    /// Sink set of the session with an active repeating request
    pub active_sinks: Option<SinkSet>,
    pub device_open: bool,
    pub surface_ready: bool,
    pub permission: PermissionStatus,
    pub recording_since_ms: Option<i64>,
    pub samples_logged: u64,
    pub frames_discarded: u64,
    pub telemetry_errors: u64,
    pub log_path: Option<PathBuf>,
    pub shut_down: bool,
}

impl StatusSnapshot {
    fn new(activation_id: Uuid, log_path: Option<PathBuf>) -> Self {
        Self {
            activation_id,
            mode: CaptureMode::Idle,
            active_sinks: None,
            device_open: false,
            surface_ready: false,
            permission: PermissionStatus::NotDetermined,
            recording_since_ms: None,
            samples_logged: 0,
            frames_discarded: 0,
            telemetry_errors: 0,
            log_path,
            shut_down: false,
        }
    }

    /// Elapsed recording time for an on-screen timer
    pub fn recording_elapsed_ms(&self, now_ms: i64) -> Option<i64> {
        self.recording_since_ms
            .map(|since| now_ms.saturating_sub(since).max(0))
    }
}

/// Publishing side of the event surface, owned by the session manager
pub struct Notifier {
    status: watch::Sender<StatusSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl Notifier {
    pub fn new(
        activation_id: Uuid,
        log_path: Option<PathBuf>,
    ) -> (Self, watch::Receiver<StatusSnapshot>) {
        let (status, status_rx) = watch::channel(StatusSnapshot::new(activation_id, log_path));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        (Self { status, events }, status_rx)
    }

    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn diagnostic(&self, error: &CaptureError) {
        self.emit(SessionEvent::Diagnostic(Diagnostic::from(error)));
    }

    pub fn update(&self, apply: impl FnOnce(&mut StatusSnapshot)) {
        self.status.send_modify(apply);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }
}
