//! Synthetic camera backend
//!
//! Simulates an exclusive capture device entirely in software: open and
//! configure complete on helper threads after a configurable delay, and a
//! repeating request runs a frame thread that feeds every bound surface and
//! reports a drifting ISO reading per frame.

use super::{CameraBackend, CameraDevice, HardwareEvent, HardwareReply, HardwareSession, Surface};
use crate::config::IsoCamConfig;
use crate::errors::HardwareError;
use crate::testing::{synthetic_iso, synthetic_video_frame};
use crate::types::SessionId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub device_id: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub open_delay: Duration,
    pub configure_delay: Duration,
    pub base_iso: i32,
    pub iso_jitter: i32,
}

impl SyntheticConfig {
    /// Frames are produced at the recording resolution so the encoder
    /// accepts them unchanged.
    pub fn from_config(config: &IsoCamConfig) -> Self {
        Self {
            device_id: config.camera.device_id.clone(),
            width: config.recording.width,
            height: config.recording.height,
            frame_rate: config.camera.frame_rate.max(1),
            open_delay: Duration::from_millis(config.camera.open_delay_ms),
            configure_delay: Duration::from_millis(config.camera.configure_delay_ms),
            base_iso: config.camera.base_iso,
            iso_jitter: config.camera.iso_jitter,
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            device_id: "0".to_string(),
            width: 320,
            height: 240,
            frame_rate: 30,
            open_delay: Duration::from_millis(10),
            configure_delay: Duration::from_millis(10),
            base_iso: 100,
            iso_jitter: 20,
        }
    }
}

#[derive(Default)]
struct Shared {
    /// `closed` flag of the device currently held open, if any
    current: Mutex<Option<Arc<AtomicBool>>>,
    reply: Mutex<Option<HardwareReply>>,
    frames_produced: AtomicU64,
}

impl Shared {
    fn current_device(&self) -> Option<Arc<AtomicBool>> {
        lock(&self.current).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Software camera implementing [`CameraBackend`]
pub struct SyntheticCamera {
    config: Arc<SyntheticConfig>,
    shared: Arc<Shared>,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config: Arc::new(config),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Out-of-band control over the simulated hardware
    pub fn controller(&self) -> SyntheticController {
        SyntheticController {
            device_id: self.config.device_id.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl CameraBackend for SyntheticCamera {
    fn open(&mut self, device_id: &str, reply: HardwareReply) -> Result<(), HardwareError> {
        if device_id != self.config.device_id {
            return Err(HardwareError::Access(format!("unknown device {device_id}")));
        }
        if let Some(closed) = self.shared.current_device() {
            if !closed.load(Ordering::SeqCst) {
                return Err(HardwareError::Access(format!(
                    "device {device_id} is already in use"
                )));
            }
        }

        *lock(&self.shared.reply) = Some(reply.clone());

        let config = self.config.clone();
        let shared = self.shared.clone();
        std::thread::Builder::new()
            .name("isocam-synthetic-open".to_string())
            .spawn(move || {
                std::thread::sleep(config.open_delay);
                let closed = Arc::new(AtomicBool::new(false));
                *lock(&shared.current) = Some(closed.clone());
                let device = SyntheticDevice {
                    config,
                    shared,
                    closed,
                };
                let _ = reply.post(HardwareEvent::DeviceOpened(Box::new(device)));
            })
            .map_err(|e| HardwareError::Access(format!("spawn failed: {e}")))?;

        Ok(())
    }
}

/// Handle used to inject hardware-side events into a running synthetic camera
#[derive(Clone)]
pub struct SyntheticController {
    device_id: String,
    shared: Arc<Shared>,
}

impl SyntheticController {
    /// Simulate the device being unplugged. Returns `false` when no device
    /// is open.
    pub fn disconnect(&self) -> bool {
        let closed = match self.shared.current_device() {
            Some(closed) if !closed.load(Ordering::SeqCst) => closed,
            _ => return false,
        };
        closed.store(true, Ordering::SeqCst);
        log::warn!("Synthetic device {} disconnected", self.device_id);

        match lock(&self.shared.reply).as_ref() {
            Some(reply) => reply.post(HardwareEvent::DeviceDisconnected {
                device_id: self.device_id.clone(),
            }),
            None => false,
        }
    }

    pub fn frames_produced(&self) -> u64 {
        self.shared.frames_produced.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        self.shared
            .current_device()
            .is_some_and(|closed| !closed.load(Ordering::SeqCst))
    }
}

struct SyntheticDevice {
    config: Arc<SyntheticConfig>,
    shared: Arc<Shared>,
    closed: Arc<AtomicBool>,
}

impl CameraDevice for SyntheticDevice {
    fn id(&self) -> &str {
        &self.config.device_id
    }

    fn create_session(
        &mut self,
        session: SessionId,
        targets: Vec<Surface>,
        reply: HardwareReply,
    ) -> Result<(), HardwareError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HardwareError::Closed);
        }
        if targets.is_empty() {
            return Err(HardwareError::Access("session needs at least one target".into()));
        }

        let config = self.config.clone();
        let shared = self.shared.clone();
        let closed = self.closed.clone();
        std::thread::Builder::new()
            .name("isocam-synthetic-configure".to_string())
            .spawn(move || {
                std::thread::sleep(config.configure_delay);
                if closed.load(Ordering::SeqCst) {
                    let _ = reply.post(HardwareEvent::SessionConfigureFailed {
                        session,
                        reason: "device closed during configuration".to_string(),
                    });
                    return;
                }
                let hw = SyntheticSession {
                    id: session,
                    config,
                    shared,
                    device_closed: closed,
                    reply: reply.clone(),
                    repeat: None,
                    closed: false,
                };
                let _ = reply.post(HardwareEvent::SessionConfigured(Box::new(hw)));
            })
            .map_err(|e| HardwareError::Access(format!("spawn failed: {e}")))?;

        Ok(())
    }

    fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("Synthetic device {} closed", self.config.device_id);
        }
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.close();
    }
}

struct RepeatWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct SyntheticSession {
    id: SessionId,
    config: Arc<SyntheticConfig>,
    shared: Arc<Shared>,
    device_closed: Arc<AtomicBool>,
    reply: HardwareReply,
    repeat: Option<RepeatWorker>,
    closed: bool,
}

impl SyntheticSession {
    fn halt_repeat(&mut self) {
        if let Some(worker) = self.repeat.take() {
            worker.stop.store(true, Ordering::SeqCst);
            if worker.handle.join().is_err() {
                log::warn!("Synthetic repeat thread for session {} panicked", self.id);
            }
        }
    }
}

impl HardwareSession for SyntheticSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn set_repeating(&mut self, targets: &[Surface]) -> Result<(), HardwareError> {
        if self.closed || self.device_closed.load(Ordering::SeqCst) {
            return Err(HardwareError::Access("device closed".to_string()));
        }
        self.halt_repeat();

        let stop = Arc::new(AtomicBool::new(false));
        let targets: Vec<Surface> = targets.to_vec();
        let config = self.config.clone();
        let shared = self.shared.clone();
        let device_closed = self.device_closed.clone();
        let reply = self.reply.clone();
        let session = self.id;
        let thread_stop = stop.clone();

        let handle = std::thread::Builder::new()
            .name("isocam-synthetic-repeat".to_string())
            .spawn(move || {
                let interval = config.frame_interval();
                let mut frame_number = 0u64;
                while !thread_stop.load(Ordering::SeqCst) && !device_closed.load(Ordering::SeqCst)
                {
                    let frame = synthetic_video_frame(frame_number, config.width, config.height)
                        .with_frame_number(frame_number);
                    for target in &targets {
                        target.consume(&frame);
                    }
                    shared.frames_produced.fetch_add(1, Ordering::Relaxed);

                    let iso = synthetic_iso(frame_number, config.base_iso, config.iso_jitter);
                    if !reply.capture_completed(session, frame_number, Some(iso)) {
                        break;
                    }
                    frame_number += 1;
                    std::thread::sleep(interval);
                }
            })
            .map_err(|e| HardwareError::Access(format!("spawn failed: {e}")))?;

        self.repeat = Some(RepeatWorker { stop, handle });
        Ok(())
    }

    fn stop_repeating(&mut self) -> Result<(), HardwareError> {
        self.halt_repeat();
        if self.device_closed.load(Ordering::SeqCst) {
            return Err(HardwareError::Access("device closed".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.halt_repeat();
        self.closed = true;
    }
}

impl Drop for SyntheticSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::messages::Message;
    use crossbeam_channel::unbounded;

    fn quick_config() -> SyntheticConfig {
        SyntheticConfig {
            width: 16,
            height: 8,
            frame_rate: 200,
            open_delay: Duration::from_millis(1),
            configure_delay: Duration::from_millis(1),
            ..SyntheticConfig::default()
        }
    }

    fn recv_hardware(rx: &crossbeam_channel::Receiver<Message>) -> HardwareEvent {
        match rx.recv_timeout(Duration::from_secs(2)).expect("no hardware event") {
            Message::Hardware(event) => event,
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_open_unknown_device_is_rejected() {
        let (tx, _rx) = unbounded();
        let mut camera = SyntheticCamera::new(quick_config());
        let result = camera.open("does-not-exist", HardwareReply::new(tx));
        assert!(matches!(result, Err(HardwareError::Access(_))));
    }

    #[test]
    fn test_open_configure_and_repeat() {
        let (tx, rx) = unbounded();
        let reply = HardwareReply::new(tx);
        let mut camera = SyntheticCamera::new(quick_config());
        let controller = camera.controller();

        camera.open("0", reply.clone()).unwrap();
        let mut device = match recv_hardware(&rx) {
            HardwareEvent::DeviceOpened(device) => device,
            other => panic!("expected open, got {other:?}"),
        };
        assert!(controller.is_open());
        assert!(camera.open("0", reply.clone()).is_err(), "device is exclusive");

        let surface: Surface = Arc::new(crate::testing::CountingSurface::new("preview"));
        device
            .create_session(SessionId(1), vec![surface.clone()], reply.clone())
            .unwrap();
        let mut session = match recv_hardware(&rx) {
            HardwareEvent::SessionConfigured(session) => session,
            other => panic!("expected configured, got {other:?}"),
        };
        assert_eq!(session.id(), SessionId(1));

        session.set_repeating(&[surface]).unwrap();
        match recv_hardware(&rx) {
            HardwareEvent::CaptureCompleted {
                session,
                sensor_sensitivity,
                ..
            } => {
                assert_eq!(session, SessionId(1));
                assert!(sensor_sensitivity.is_some());
            }
            other => panic!("expected frame, got {other:?}"),
        }

        session.stop_repeating().unwrap();
        session.close();
        device.close();
        assert!(!controller.is_open());
    }

    #[test]
    fn test_disconnect_fails_repeating() {
        let (tx, rx) = unbounded();
        let reply = HardwareReply::new(tx);
        let mut camera = SyntheticCamera::new(quick_config());
        let controller = camera.controller();
        assert!(!controller.disconnect(), "nothing open yet");

        camera.open("0", reply.clone()).unwrap();
        let mut device = match recv_hardware(&rx) {
            HardwareEvent::DeviceOpened(device) => device,
            other => panic!("expected open, got {other:?}"),
        };
        let surface: Surface = Arc::new(crate::testing::CountingSurface::new("preview"));
        device
            .create_session(SessionId(7), vec![surface.clone()], reply.clone())
            .unwrap();
        let mut session = match recv_hardware(&rx) {
            HardwareEvent::SessionConfigured(session) => session,
            other => panic!("expected configured, got {other:?}"),
        };

        assert!(controller.disconnect());
        assert!(matches!(
            session.set_repeating(&[surface]),
            Err(HardwareError::Access(_))
        ));
        assert!(matches!(
            device.create_session(SessionId(8), Vec::new(), reply),
            Err(HardwareError::Closed)
        ));
    }
}
