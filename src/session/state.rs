//! Resource-owning session state
//!
//! A live hardware session only exists inside [`Stage::Previewing`] or
//! [`Stage::Recording`], so there is never more than one. Both handle types
//! release their hardware on drop.

use crate::errors::HardwareError;
use crate::platform::{CameraDevice, HardwareSession, Surface};
use crate::types::{CaptureMode, SessionId, SinkSet};

/// Why a session configure request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigureReason {
    /// First preview after the device opened
    Preview,
    /// Combined preview and recorder session
    Record,
    /// Preview rebuilt after recording ended or failed
    ResumePreview,
}

impl ConfigureReason {
    pub(crate) fn sinks(self) -> SinkSet {
        match self {
            ConfigureReason::Record => SinkSet::PreviewAndRecorder,
            ConfigureReason::Preview | ConfigureReason::ResumePreview => SinkSet::Preview,
        }
    }

    /// Mode reported while the request is pending
    pub(crate) fn shown_mode(self) -> CaptureMode {
        match self {
            ConfigureReason::Preview => CaptureMode::Idle,
            ConfigureReason::Record | ConfigureReason::ResumePreview => CaptureMode::Previewing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingConfigure {
    pub request: SessionId,
    pub reason: ConfigureReason,
}

pub(crate) enum Stage {
    Idle,
    /// Device open requested, result not yet delivered
    Opening,
    Configuring(PendingConfigure),
    Previewing(LiveSession),
    Recording { session: LiveSession, since_ms: i64 },
}

impl Stage {
    pub(crate) fn mode(&self) -> CaptureMode {
        match self {
            Stage::Idle | Stage::Opening => CaptureMode::Idle,
            Stage::Configuring(pending) => pending.reason.shown_mode(),
            Stage::Previewing(_) => CaptureMode::Previewing,
            Stage::Recording { .. } => CaptureMode::Recording,
        }
    }

    /// A hardware callback is outstanding
    pub(crate) fn in_flight(&self) -> bool {
        matches!(self, Stage::Opening | Stage::Configuring(_))
    }

    pub(crate) fn live_session(&self) -> Option<&LiveSession> {
        match self {
            Stage::Previewing(session) | Stage::Recording { session, .. } => Some(session),
            _ => None,
        }
    }

    pub(crate) fn recording_since(&self) -> Option<i64> {
        match self {
            Stage::Recording { since_ms, .. } => Some(*since_ms),
            _ => None,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Opening => "opening",
            Stage::Configuring(_) => "configuring",
            Stage::Previewing(_) => "previewing",
            Stage::Recording { .. } => "recording",
        }
    }
}

/// A configured session plus the sink set it was built for
pub(crate) struct LiveSession {
    sinks: SinkSet,
    hw: Box<dyn HardwareSession>,
    repeating: bool,
    closed: bool,
}

impl LiveSession {
    pub(crate) fn new(hw: Box<dyn HardwareSession>, sinks: SinkSet) -> Self {
        Self {
            sinks,
            hw,
            repeating: false,
            closed: false,
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.hw.id()
    }

    pub(crate) fn sinks(&self) -> SinkSet {
        self.sinks
    }

    pub(crate) fn is_repeating(&self) -> bool {
        self.repeating
    }

    pub(crate) fn start_repeating(&mut self, targets: &[Surface]) -> Result<(), HardwareError> {
        self.hw.set_repeating(targets)?;
        self.repeating = true;
        Ok(())
    }

    pub(crate) fn stop_repeating(&mut self) -> Result<(), HardwareError> {
        if !self.repeating {
            return Ok(());
        }
        self.repeating = false;
        self.hw.stop_repeating()
    }

    /// Stop repeating (errors are logged) and release the session
    pub(crate) fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.stop_repeating() {
            log::warn!("Stop repeating on session {} failed: {}", self.id(), e);
        }
        self.hw.close();
        self.closed = true;
        log::debug!("Session {} closed", self.id());
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Exclusive ownership of the open device, if any
#[derive(Default)]
pub(crate) struct DeviceHandle {
    device: Option<Box<dyn CameraDevice>>,
}

impl DeviceHandle {
    pub(crate) fn attach(&mut self, device: Box<dyn CameraDevice>) {
        self.close();
        self.device = Some(device);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub(crate) fn device_mut(&mut self) -> Option<&mut (dyn CameraDevice + 'static)> {
        self.device.as_deref_mut()
    }

    /// Release the device. Returns the id of the device that was closed.
    pub(crate) fn close(&mut self) -> Option<String> {
        let mut device = self.device.take()?;
        let id = device.id().to_string();
        device.close();
        Some(id)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}
