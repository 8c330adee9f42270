//! Video recording module for isocam
//!
//! The capture core only sees the [`RecordingSink`] contract. With the
//! `recording` feature enabled, [`Mp4RecordingSink`] implements it using:
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing
//!
//! # Example
//! ```rust,ignore
//! use isocam::recording::{Mp4RecordingSink, RecordingSink, VideoParams};
//!
//! let mut sink = Mp4RecordingSink::new();
//! let surface = sink.prepare("recorded_video.mp4".as_ref(), &VideoParams::default())?;
//! // bind `surface` to a streaming capture session, then:
//! sink.start()?;
//! // ...
//! let stats = sink.stop()?;
//! sink.reset();
//! ```

mod config;
#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod mp4_sink;
#[cfg(feature = "recording")]
mod recorder;
mod sink;

pub use config::{OutputFormat, RecordingStats, VideoCodec, VideoParams};
#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use mp4_sink::Mp4RecordingSink;
#[cfg(feature = "recording")]
pub use recorder::Mp4Writer;
pub use sink::{RecordingSink, SinkState};

#[cfg(test)]
mod tests;
