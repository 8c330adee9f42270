//! MP4 writer combining the H.264 encoder and the muxer

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use muxide::api::{Metadata, MuxerBuilder, VideoCodec as MuxCodec};

use super::config::{RecordingStats, VideoParams};
use super::encoder::H264Encoder;
use crate::errors::CaptureError;
use crate::types::VideoFrame;

/// Encodes frames to H.264 and muxes them into an MP4 file
pub struct Mp4Writer {
    encoder: H264Encoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    output_path: String,
    frame_count: u64,
    dropped_frames: u64,
    started: Option<Instant>,
    last_frame: Option<Instant>,
    frame_duration_secs: f64,
}

impl Mp4Writer {
    /// Create (truncating) the output file and configure encoder/muxer
    pub fn create(output_path: &Path, params: &VideoParams) -> Result<Self, CaptureError> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CaptureError::Prepare(format!("Failed to create output directory: {}", e))
                })?;
            }
        }

        let file = File::create(output_path)
            .map_err(|e| CaptureError::Prepare(format!("Failed to create output file: {}", e)))?;
        let encoder = H264Encoder::new(params)?;

        let mut metadata = Metadata::new().with_current_time();
        if let Some(ref title) = params.title {
            metadata = metadata.with_title(title);
        }

        let muxer = MuxerBuilder::new(BufWriter::new(file))
            .video(MuxCodec::H264, params.width, params.height, params.fps)
            .with_fast_start(params.fast_start)
            .with_metadata(metadata)
            .build()
            .map_err(|e| CaptureError::Prepare(format!("Failed to create muxer: {}", e)))?;

        Ok(Self {
            encoder,
            muxer,
            output_path: output_path.to_string_lossy().to_string(),
            frame_count: 0,
            dropped_frames: 0,
            started: None,
            last_frame: None,
            frame_duration_secs: 1.0 / params.fps.max(1.0),
        })
    }

    /// Encode and mux one frame. Frames arriving faster than the target
    /// frame rate are dropped rather than retimed.
    pub fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), CaptureError> {
        let now = Instant::now();
        self.started.get_or_insert(now);

        if let Some(last) = self.last_frame {
            if now.duration_since(last).as_secs_f64() < self.frame_duration_secs * 0.8 {
                self.dropped_frames += 1;
                return Ok(());
            }
        }

        let encoded = self.encoder.encode_frame(frame)?;
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = self.frame_count as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CaptureError::Encoding(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        self.last_frame = Some(now);
        Ok(())
    }

    /// Finalize the file and return statistics
    pub fn finish(self) -> Result<RecordingStats, CaptureError> {
        let stats = self
            .muxer
            .finish_with_stats()
            .map_err(|e| CaptureError::SinkStop(format!("Failed to finalize recording: {}", e)))?;

        Ok(RecordingStats {
            video_frames: stats.video_frames,
            duration_secs: stats.duration_secs,
            bytes_written: stats.bytes_written,
            dropped_frames: self.dropped_frames,
            output_path: self.output_path,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
