//! In-memory recorder, telemetry and clock for driving the session manager

use crate::errors::CaptureError;
use crate::platform::{CountingSurface, Surface};
use crate::recording::{RecordingSink, RecordingStats, SinkState, VideoParams};
use crate::telemetry::TelemetrySink;
use crate::timing::WallClock;
use crate::types::TelemetrySample;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SinkLog {
    state: SinkState,
    prepares: u32,
    starts: u32,
    stops: u32,
    resets: u32,
    fail_prepare: bool,
    fail_start: bool,
    last_output: Option<PathBuf>,
}

/// Recording sink that tracks its lifecycle without encoding anything
pub struct ScriptedRecordingSink {
    log: Arc<Mutex<SinkLog>>,
    surface: Arc<CountingSurface>,
}

impl ScriptedRecordingSink {
    pub fn with_probe() -> (Self, SinkProbe) {
        let log = Arc::new(Mutex::new(SinkLog {
            state: SinkState::Unconfigured,
            prepares: 0,
            starts: 0,
            stops: 0,
            resets: 0,
            fail_prepare: false,
            fail_start: false,
            last_output: None,
        }));
        let surface = Arc::new(CountingSurface::new("recorder"));
        let probe = SinkProbe {
            log: log.clone(),
            surface: surface.clone(),
        };
        (Self { log, surface }, probe)
    }
}

impl RecordingSink for ScriptedRecordingSink {
    fn prepare(&mut self, output: &Path, _params: &VideoParams) -> Result<Surface, CaptureError> {
        let mut log = lock(&self.log);
        log.prepares += 1;
        if log.fail_prepare {
            return Err(CaptureError::Prepare("scripted prepare failure".to_string()));
        }
        if log.state != SinkState::Unconfigured {
            return Err(CaptureError::Prepare(format!(
                "prepare in state {:?}",
                log.state
            )));
        }
        log.state = SinkState::Prepared;
        log.last_output = Some(output.to_path_buf());
        let surface: Surface = self.surface.clone();
        Ok(surface)
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let mut log = lock(&self.log);
        log.starts += 1;
        if log.fail_start {
            return Err(CaptureError::SinkStart("scripted start failure".to_string()));
        }
        if log.state != SinkState::Prepared {
            return Err(CaptureError::SinkStart(format!(
                "start in state {:?}",
                log.state
            )));
        }
        log.state = SinkState::Active;
        Ok(())
    }

    fn stop(&mut self) -> Result<RecordingStats, CaptureError> {
        let mut log = lock(&self.log);
        log.stops += 1;
        if log.state != SinkState::Active {
            return Err(CaptureError::SinkStop(format!(
                "stop in state {:?}",
                log.state
            )));
        }
        log.state = SinkState::Stopped;
        Ok(RecordingStats {
            video_frames: self.surface.frames(),
            output_path: log
                .last_output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            ..RecordingStats::default()
        })
    }

    fn reset(&mut self) {
        let mut log = lock(&self.log);
        log.resets += 1;
        log.state = SinkState::Unconfigured;
    }

    fn state(&self) -> SinkState {
        lock(&self.log).state
    }
}

/// Inspection and fault injection for a [`ScriptedRecordingSink`]
#[derive(Clone)]
pub struct SinkProbe {
    log: Arc<Mutex<SinkLog>>,
    surface: Arc<CountingSurface>,
}

impl SinkProbe {
    pub fn state(&self) -> SinkState {
        lock(&self.log).state
    }

    pub fn prepares(&self) -> u32 {
        lock(&self.log).prepares
    }

    pub fn starts(&self) -> u32 {
        lock(&self.log).starts
    }

    pub fn stops(&self) -> u32 {
        lock(&self.log).stops
    }

    pub fn resets(&self) -> u32 {
        lock(&self.log).resets
    }

    pub fn last_output(&self) -> Option<PathBuf> {
        lock(&self.log).last_output.clone()
    }

    pub fn fail_prepare(&self, fail: bool) {
        lock(&self.log).fail_prepare = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        lock(&self.log).fail_start = fail;
    }

    /// Frames that reached the recorder surface
    pub fn frames(&self) -> u64 {
        self.surface.frames()
    }
}

#[derive(Default)]
struct MemoryLog {
    samples: Vec<TelemetrySample>,
    closed: bool,
    failing: bool,
}

/// Telemetry sink keeping samples in memory. Clones share the same log.
#[derive(Clone, Default)]
pub struct MemoryTelemetry {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<TelemetrySample> {
        lock(&self.log).samples.clone()
    }

    pub fn values(&self) -> Vec<i32> {
        lock(&self.log).samples.iter().map(|s| s.value).collect()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.log).closed
    }

    /// Make every following write fail with an I/O error
    pub fn set_failing(&self, failing: bool) {
        lock(&self.log).failing = failing;
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn record(&mut self, sample: TelemetrySample) -> Result<(), CaptureError> {
        let mut log = lock(&self.log);
        if log.closed {
            return Err(CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "telemetry log is closed",
            )));
        }
        if log.failing {
            return Err(CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "scripted write failure",
            )));
        }
        log.samples.push(sample);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        lock(&self.log).closed = true;
        Ok(())
    }
}

/// Hand-advanced wall clock. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn now(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now()
    }
}
