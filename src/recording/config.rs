//! Recording configuration types

use serde::{Deserialize, Serialize};

/// Container format of the recording output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Mpeg4,
}

/// Video codec of the recording output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
}

/// Static encoder parameters handed to [`RecordingSink::prepare`]
///
/// [`RecordingSink::prepare`]: super::RecordingSink::prepare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Video width in pixels
    pub width: u32,
    /// Video height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    pub format: OutputFormat,
    pub codec: VideoCodec,
    /// Enable fast-start for web streaming (moov before mdat)
    pub fast_start: bool,
    /// Optional title metadata
    pub title: Option<String>,
}

impl VideoParams {
    pub const FIXED_WIDTH: u32 = 1920;
    pub const FIXED_HEIGHT: u32 = 1080;
    pub const FIXED_FPS: f64 = 30.0;
    pub const FIXED_BITRATE: u32 = 10_000_000;

    /// Create parameters with explicit dimensions
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate: Self::FIXED_BITRATE,
            format: OutputFormat::Mpeg4,
            codec: VideoCodec::H264,
            fast_start: true,
            title: None,
        }
    }

    /// Set custom bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Set fast-start mode
    pub fn with_fast_start(mut self, enabled: bool) -> Self {
        self.fast_start = enabled;
        self
    }

    /// Set the title metadata
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Expected byte length of one RGB24 input frame
    pub fn rgb_frame_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 3
    }
}

impl Default for VideoParams {
    /// 1920x1080 H.264 in MPEG-4 at 10 Mbit/s and 30 fps
    fn default() -> Self {
        Self::new(Self::FIXED_WIDTH, Self::FIXED_HEIGHT, Self::FIXED_FPS)
    }
}

/// Statistics returned after stopping a recording
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Total number of video frames written
    pub video_frames: u64,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Total bytes written to file
    pub bytes_written: u64,
    /// Number of dropped frames (if any)
    pub dropped_frames: u64,
    /// Output file path
    pub output_path: String,
}

impl RecordingStats {
    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}
