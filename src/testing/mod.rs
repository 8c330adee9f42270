//! Testing utilities for isocam
//!
//! Synthetic frame content plus scripted stand-ins for the camera, the
//! recorder, the telemetry log and the clock, so the capture core can be
//! exercised without hardware.

mod doubles;
mod harness;
mod scripted;
pub mod synthetic_data;

pub use crate::platform::CountingSurface;
pub use doubles::{ManualClock, MemoryTelemetry, ScriptedRecordingSink, SinkProbe};
pub use harness::{Harness, HARNESS_DEVICE, HARNESS_EPOCH_MS};
pub use scripted::{HardwareCall, OpenOutcome, ScriptedBackend, ScriptedHardware, ScriptedSession};
pub use synthetic_data::{synthetic_iso, synthetic_video_frame};
