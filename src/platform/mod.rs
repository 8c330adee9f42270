//! Hardware capture abstraction
//!
//! The capture core never calls into a camera stack directly. It drives these
//! traits, and every asynchronous result (device open, session configure,
//! per-frame completion) comes back as a [`HardwareEvent`] posted through a
//! [`HardwareReply`] onto the session worker's queue.

pub mod synthetic;

pub use synthetic::{SyntheticCamera, SyntheticConfig, SyntheticController};

use crate::errors::HardwareError;
use crate::session::messages::Message;
use crate::types::{SessionId, VideoFrame};
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A destination that accepts frames from a repeating request
pub trait FrameConsumer: Send + Sync {
    fn consume(&self, frame: &VideoFrame);

    fn label(&self) -> &str;
}

/// Shared frame destination (display surface or recorder input)
pub type Surface = Arc<dyn FrameConsumer>;

/// Headless display surface that only counts what it is shown
#[derive(Debug)]
pub struct CountingSurface {
    label: String,
    frames: AtomicU64,
    last_frame: AtomicU64,
}

impl CountingSurface {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            frames: AtomicU64::new(0),
            last_frame: AtomicU64::new(0),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn last_frame_number(&self) -> u64 {
        self.last_frame.load(Ordering::Relaxed)
    }
}

impl FrameConsumer for CountingSurface {
    fn consume(&self, frame: &VideoFrame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.last_frame.store(frame.frame_number, Ordering::Relaxed);
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Entry point of a camera stack. Opens devices asynchronously.
pub trait CameraBackend: Send {
    /// Issue an asynchronous open. The outcome arrives later as
    /// `DeviceOpened`, `DeviceDisconnected` or `DeviceError` on `reply`.
    /// An `Err` here means the request could not even be issued.
    fn open(&mut self, device_id: &str, reply: HardwareReply) -> Result<(), HardwareError>;
}

/// An exclusively owned, open capture device
pub trait CameraDevice: Send {
    fn id(&self) -> &str;

    /// Request a capture session bound to exactly `targets`. The outcome
    /// arrives later as `SessionConfigured` or `SessionConfigureFailed`
    /// tagged with `session`.
    fn create_session(
        &mut self,
        session: SessionId,
        targets: Vec<Surface>,
        reply: HardwareReply,
    ) -> Result<(), HardwareError>;

    /// Release exclusive access. Must tolerate repeated calls.
    fn close(&mut self);
}

/// A configured capture session on a device
pub trait HardwareSession: Send {
    fn id(&self) -> SessionId;

    /// Start continuous capture into every target. Completed frames are
    /// reported as `CaptureCompleted`. Fails with `Access` when the device
    /// was closed concurrently.
    fn set_repeating(&mut self, targets: &[Surface]) -> Result<(), HardwareError>;

    fn stop_repeating(&mut self) -> Result<(), HardwareError>;

    fn close(&mut self);
}

/// Asynchronous results posted by hardware onto the session worker
pub enum HardwareEvent {
    DeviceOpened(Box<dyn CameraDevice>),
    DeviceDisconnected {
        device_id: String,
    },
    DeviceError {
        device_id: String,
        code: i32,
    },
    SessionConfigured(Box<dyn HardwareSession>),
    SessionConfigureFailed {
        session: SessionId,
        reason: String,
    },
    CaptureCompleted {
        session: SessionId,
        frame_number: u64,
        /// `None` when the frame carried no sensor sensitivity metadata
        sensor_sensitivity: Option<i32>,
    },
}

impl fmt::Debug for HardwareEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareEvent::DeviceOpened(device) => {
                f.debug_tuple("DeviceOpened").field(&device.id()).finish()
            }
            HardwareEvent::DeviceDisconnected { device_id } => f
                .debug_struct("DeviceDisconnected")
                .field("device_id", device_id)
                .finish(),
            HardwareEvent::DeviceError { device_id, code } => f
                .debug_struct("DeviceError")
                .field("device_id", device_id)
                .field("code", code)
                .finish(),
            HardwareEvent::SessionConfigured(session) => f
                .debug_tuple("SessionConfigured")
                .field(&session.id())
                .finish(),
            HardwareEvent::SessionConfigureFailed { session, reason } => f
                .debug_struct("SessionConfigureFailed")
                .field("session", session)
                .field("reason", reason)
                .finish(),
            HardwareEvent::CaptureCompleted {
                session,
                frame_number,
                sensor_sensitivity,
            } => f
                .debug_struct("CaptureCompleted")
                .field("session", session)
                .field("frame_number", frame_number)
                .field("sensor_sensitivity", sensor_sensitivity)
                .finish(),
        }
    }
}

/// Posting half of the worker queue handed to hardware
#[derive(Clone)]
pub struct HardwareReply {
    tx: Sender<Message>,
}

impl HardwareReply {
    pub fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    /// Post an event; returns `false` once the worker has gone away.
    pub fn post(&self, event: HardwareEvent) -> bool {
        self.tx.send(Message::Hardware(event)).is_ok()
    }

    pub fn capture_completed(
        &self,
        session: SessionId,
        frame_number: u64,
        sensor_sensitivity: Option<i32>,
    ) -> bool {
        self.post(HardwareEvent::CaptureCompleted {
            session,
            frame_number,
            sensor_sensitivity,
        })
    }
}

impl fmt::Debug for HardwareReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareReply").finish_non_exhaustive()
    }
}
