//! Recording sink writing MPEG-4/H.264 files

use super::config::{RecordingStats, VideoParams};
use super::recorder::Mp4Writer;
use super::sink::{RecordingSink, SinkState};
use crate::errors::CaptureError;
use crate::platform::{FrameConsumer, Surface};
use crate::types::VideoFrame;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Input surface of the MP4 sink. Frames are only encoded while active.
struct EncoderSurface {
    writer: Mutex<Option<Mp4Writer>>,
    active: AtomicBool,
    write_errors: AtomicU64,
}

impl EncoderSurface {
    fn writer(&self) -> MutexGuard<'_, Option<Mp4Writer>> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FrameConsumer for EncoderSurface {
    fn consume(&self, frame: &VideoFrame) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if let Some(writer) = self.writer().as_mut() {
            if let Err(e) = writer.write_frame(frame) {
                let n = self.write_errors.fetch_add(1, Ordering::Relaxed);
                if n == 0 {
                    log::warn!("Recorder rejected frame {}: {}", frame.frame_number, e);
                }
            }
        }
    }

    fn label(&self) -> &str {
        "recorder"
    }
}

/// [`RecordingSink`] backed by openh264 and muxide
pub struct Mp4RecordingSink {
    state: SinkState,
    surface: Arc<EncoderSurface>,
}

impl Mp4RecordingSink {
    pub fn new() -> Self {
        Self {
            state: SinkState::Unconfigured,
            surface: Arc::new(EncoderSurface {
                writer: Mutex::new(None),
                active: AtomicBool::new(false),
                write_errors: AtomicU64::new(0),
            }),
        }
    }

    /// Frames rejected by the encoder since the last prepare
    pub fn write_errors(&self) -> u64 {
        self.surface.write_errors.load(Ordering::Relaxed)
    }
}

impl Default for Mp4RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink for Mp4RecordingSink {
    fn prepare(&mut self, output: &Path, params: &VideoParams) -> Result<Surface, CaptureError> {
        if self.state != SinkState::Unconfigured {
            return Err(CaptureError::Prepare(format!(
                "sink must be reset before prepare (state {:?})",
                self.state
            )));
        }

        let writer = Mp4Writer::create(output, params)?;
        *self.surface.writer() = Some(writer);
        self.surface.write_errors.store(0, Ordering::Relaxed);
        self.state = SinkState::Prepared;
        log::info!(
            "Recorder prepared: {:?} {}x{} @ {} fps, {} bps",
            output,
            params.width,
            params.height,
            params.fps,
            params.bitrate
        );

        let surface: Surface = self.surface.clone();
        Ok(surface)
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != SinkState::Prepared {
            return Err(CaptureError::SinkStart(format!(
                "sink is not prepared (state {:?})",
                self.state
            )));
        }
        self.surface.active.store(true, Ordering::SeqCst);
        self.state = SinkState::Active;
        Ok(())
    }

    fn stop(&mut self) -> Result<RecordingStats, CaptureError> {
        if self.state != SinkState::Active {
            return Err(CaptureError::SinkStop(format!(
                "sink was not started (state {:?})",
                self.state
            )));
        }
        self.surface.active.store(false, Ordering::SeqCst);
        self.state = SinkState::Stopped;

        let writer = self
            .surface
            .writer()
            .take()
            .ok_or_else(|| CaptureError::SinkStop("no output is open".to_string()))?;
        let stats = writer.finish()?;
        log::info!(
            "Recording finalized: {} frames, {} bytes -> {}",
            stats.video_frames,
            stats.bytes_written,
            stats.output_path
        );
        Ok(stats)
    }

    fn reset(&mut self) {
        self.surface.active.store(false, Ordering::SeqCst);
        // An unstarted writer leaves a truncated file behind, like an
        // encoder released before start.
        self.surface.writer().take();
        self.state = SinkState::Unconfigured;
    }

    fn state(&self) -> SinkState {
        self.state
    }
}
