use serde::{Deserialize, Serialize};

/// Operating mode of the capture core. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// No repeating request is active.
    Idle,
    /// Frames stream to the preview surface only.
    Previewing,
    /// Frames stream to preview and recorder; telemetry is logged.
    Recording,
}

impl CaptureMode {
    /// The sink set a live session must be bound to in this mode.
    pub fn required_sinks(self) -> Option<SinkSet> {
        match self {
            CaptureMode::Idle => None,
            CaptureMode::Previewing => Some(SinkSet::Preview),
            CaptureMode::Recording => Some(SinkSet::PreviewAndRecorder),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureMode::Idle => "idle",
            CaptureMode::Previewing => "previewing",
            CaptureMode::Recording => "recording",
        }
    }
}

impl Default for CaptureMode {
    fn default() -> Self {
        CaptureMode::Idle
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single output destination for captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Preview,
    Recorder,
}

/// Ordered set of output targets bound to a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkSet {
    Preview,
    PreviewAndRecorder,
}

impl SinkSet {
    pub fn kinds(self) -> &'static [SinkKind] {
        match self {
            SinkSet::Preview => &[SinkKind::Preview],
            SinkSet::PreviewAndRecorder => &[SinkKind::Preview, SinkKind::Recorder],
        }
    }

    pub fn contains(self, kind: SinkKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// The mode this sink set serves.
    pub fn mode(self) -> CaptureMode {
        match self {
            SinkSet::Preview => CaptureMode::Previewing,
            SinkSet::PreviewAndRecorder => CaptureMode::Recording,
        }
    }
}

impl std::fmt::Display for SinkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkSet::Preview => write!(f, "{{preview}}"),
            SinkSet::PreviewAndRecorder => write!(f, "{{preview, recorder}}"),
        }
    }
}

/// Identifier of one requested capture session. Allocated monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-frame sensor gain reading paired with the time it was logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Wall clock in epoch milliseconds at callback-processing time.
    pub timestamp_ms: i64,
    /// Sensor sensitivity (ISO).
    pub value: i32,
}

impl TelemetrySample {
    pub fn new(timestamp_ms: i64, value: i32) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// A captured RGB24 frame delivered to bound surfaces.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
    pub device_id: String,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            data,
            width,
            height,
            frame_number: 0,
            device_id,
        }
    }

    pub fn with_frame_number(mut self, frame_number: u64) -> Self {
        self.frame_number = frame_number;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }
}
