//! Controlling-thread side of a running capture session

use super::dispatcher::{run_worker, WORKER_THREAD_NAME};
use super::events::{Notifier, SessionEvent, StatusSnapshot};
use super::manager::{SessionManager, SessionParts};
use super::messages::{Command, Message};
use crate::errors::CaptureError;
use crate::platform::{HardwareReply, Surface};
use crossbeam_channel::{unbounded, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Handle to a session worker. Every method only enqueues; results are
/// observed through [`CaptureHandle::status`] and [`CaptureHandle::subscribe`].
///
/// Dropping the handle shuts the worker down and waits for it, which
/// releases the camera and finalizes any recording.
pub struct CaptureHandle {
    tx: Sender<Message>,
    status: watch::Receiver<StatusSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Start the session worker for one activation
    pub fn spawn(parts: SessionParts) -> Result<Self, CaptureError> {
        let (tx, rx) = unbounded();
        let activation_id = Uuid::new_v4();
        let log_path = parts.telemetry.path().map(|p| p.to_path_buf());
        let (notifier, status) = Notifier::new(activation_id, log_path);
        let events = notifier.event_sender();
        let manager = SessionManager::new(parts, HardwareReply::new(tx.clone()), notifier);

        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(manager, rx))?;
        log::info!("Capture activation {} started", activation_id);

        Ok(Self {
            tx,
            status,
            events,
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) -> Result<(), CaptureError> {
        self.tx
            .send(Message::Command(command))
            .map_err(|_| CaptureError::WorkerGone)
    }

    pub fn on_surface_ready(&self, surface: Surface) -> Result<(), CaptureError> {
        self.send(Command::SurfaceReady(surface))
    }

    pub fn on_surface_lost(&self) -> Result<(), CaptureError> {
        self.send(Command::SurfaceLost)
    }

    pub fn on_start_recording(&self) -> Result<(), CaptureError> {
        self.send(Command::StartRecording)
    }

    pub fn on_stop_recording(&self) -> Result<(), CaptureError> {
        self.send(Command::StopRecording)
    }

    pub fn toggle_recording(&self) -> Result<(), CaptureError> {
        self.send(Command::ToggleRecording)
    }

    pub fn on_permission_granted(&self) -> Result<(), CaptureError> {
        self.send(Command::PermissionGranted)
    }

    pub fn on_permission_denied(&self) -> Result<(), CaptureError> {
        self.send(Command::PermissionDenied)
    }

    /// Tear everything down and wait for the worker to exit
    pub fn on_shutdown(&mut self) -> Result<(), CaptureError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // A worker that already exited has nothing left to release.
        let _ = self.send(Command::Shutdown);
        worker.join().map_err(|_| CaptureError::WorkerGone)
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Block until the status satisfies `predicate` or `timeout` elapses
    pub fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&StatusSnapshot) -> bool,
    ) -> Result<StatusSnapshot, CaptureError> {
        let mut status = self.status.clone();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(async move {
            match tokio::time::timeout(timeout, status.wait_for(predicate)).await {
                Ok(Ok(snapshot)) => Ok(snapshot.clone()),
                Ok(Err(_)) => Err(CaptureError::WorkerGone),
                Err(_) => Err(CaptureError::NotReady(format!(
                    "status condition not reached within {timeout:?}"
                ))),
            }
        })
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Err(e) = self.on_shutdown() {
            log::warn!("Capture worker did not shut down cleanly: {}", e);
        }
    }
}
