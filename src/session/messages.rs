//! Messages consumed by the session worker

use crate::platform::{HardwareEvent, Surface};
use std::fmt;

/// Commands issued by the controlling (UI) thread
pub enum Command {
    SurfaceReady(Surface),
    SurfaceLost,
    StartRecording,
    StopRecording,
    /// Single record control: start when not recording, stop otherwise
    ToggleRecording,
    PermissionGranted,
    PermissionDenied,
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SurfaceReady(_) => "surface_ready",
            Command::SurfaceLost => "surface_lost",
            Command::StartRecording => "start_recording",
            Command::StopRecording => "stop_recording",
            Command::ToggleRecording => "toggle_recording",
            Command::PermissionGranted => "permission_granted",
            Command::PermissionDenied => "permission_denied",
            Command::Shutdown => "shutdown",
        }
    }

    /// Commands that wait for an in-flight transition to resolve.
    /// Shutdown never waits: it tears down whatever is live.
    pub(crate) fn waits_for_transition(&self) -> bool {
        !matches!(self, Command::Shutdown)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SurfaceReady(surface) => {
                f.debug_tuple("SurfaceReady").field(&surface.label()).finish()
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Everything the session worker reacts to, in one FIFO queue
#[derive(Debug)]
pub enum Message {
    Command(Command),
    Hardware(HardwareEvent),
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<HardwareEvent> for Message {
    fn from(event: HardwareEvent) -> Self {
        Message::Hardware(event)
    }
}
