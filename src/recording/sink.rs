//! Recording sink contract

use super::config::{RecordingStats, VideoParams};
use crate::errors::CaptureError;
use crate::platform::Surface;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lifecycle of a recording sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkState {
    Unconfigured,
    Prepared,
    Active,
    Stopped,
}

/// Opaque encoder that turns frames into an output file
///
/// Usage protocol: `prepare` → (session streaming) → `start` → `stop` →
/// `reset`. After `reset` the sink is reusable.
pub trait RecordingSink: Send {
    /// Open and configure the output. The returned surface must be bound to
    /// the capture session that will feed this sink.
    fn prepare(&mut self, output: &Path, params: &VideoParams) -> Result<Surface, CaptureError>;

    /// Begin accepting frames. Only valid once the feeding session streams.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Finalize the output. Fails with `SinkStop` when not started.
    fn stop(&mut self) -> Result<RecordingStats, CaptureError>;

    /// Discard any configuration and return to `Unconfigured`.
    fn reset(&mut self);

    fn state(&self) -> SinkState;
}
