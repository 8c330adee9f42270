//! Synchronous driver around a [`SessionManager`]
//!
//! Wires the manager to scripted hardware, an in-memory recorder and
//! telemetry log and a manual clock, then runs the worker loop by hand so
//! every step of a scenario settles before the next assertion.

use super::doubles::{ManualClock, MemoryTelemetry, ScriptedRecordingSink, SinkProbe};
use super::scripted::{ScriptedBackend, ScriptedHardware};
use crate::errors::ErrorKind;
use crate::platform::{CountingSurface, HardwareReply, Surface};
use crate::recording::VideoParams;
use crate::session::{
    Command, Message, Notifier, SessionEvent, SessionManager, SessionParts, StatusSnapshot,
};
use crate::types::SessionId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

pub const HARNESS_DEVICE: &str = "0";
pub const HARNESS_EPOCH_MS: i64 = 1_700_000_000_000;

pub struct Harness {
    pub manager: SessionManager,
    pub hardware: ScriptedHardware,
    pub sink: SinkProbe,
    pub telemetry: MemoryTelemetry,
    pub clock: ManualClock,
    preview: Arc<CountingSurface>,
    status: watch::Receiver<StatusSnapshot>,
    events: broadcast::Receiver<SessionEvent>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Harness {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        let (backend, hardware) = ScriptedBackend::with_hardware(HARNESS_DEVICE);
        let (recorder, sink) = ScriptedRecordingSink::with_probe();
        let telemetry = MemoryTelemetry::new();
        let clock = ManualClock::new(HARNESS_EPOCH_MS);

        let (notifier, status) = Notifier::new(Uuid::new_v4(), None);
        let events = notifier.subscribe();
        let parts = SessionParts {
            device_id: HARNESS_DEVICE.to_string(),
            backend: Box::new(backend),
            recorder: Box::new(recorder),
            telemetry: Box::new(telemetry.clone()),
            clock: Arc::new(clock.clone()),
            recording_path: PathBuf::from("recorded_video.mp4"),
            video_params: VideoParams::default(),
        };
        let manager = SessionManager::new(parts, HardwareReply::new(tx.clone()), notifier);

        Self {
            manager,
            hardware,
            sink,
            telemetry,
            clock,
            preview: Arc::new(CountingSurface::new("preview")),
            status,
            events,
            tx,
            rx,
        }
    }

    pub fn preview_surface(&self) -> Surface {
        self.preview.clone()
    }

    /// Queue a command without processing it
    pub fn send(&self, command: Command) {
        // The receiver lives in self, so the send cannot fail.
        let _ = self.tx.send(Message::Command(command));
    }

    /// Handle a command, then everything it caused
    pub fn command(&mut self, command: Command) {
        self.manager.handle(Message::Command(command));
        self.pump();
    }

    /// Handle queued messages until the queue is empty
    pub fn pump(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.manager.handle(message);
        }
    }

    /// Surface first, then permission: the usual activation order
    pub fn bring_up_preview(&mut self) {
        self.command(Command::SurfaceReady(self.preview_surface()));
        self.command(Command::PermissionGranted);
    }

    pub fn emit_frame(&mut self, iso: Option<i32>) -> bool {
        let sent = self.hardware.emit_frame(iso);
        self.pump();
        sent
    }

    pub fn emit_frame_for(&mut self, session: SessionId, iso: Option<i32>) -> bool {
        let sent = self.hardware.emit_frame_for(session, iso);
        self.pump();
        sent
    }

    pub fn disconnect(&mut self) {
        self.hardware.disconnect();
        self.pump();
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Drain the events emitted since the last call
    pub fn events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }

    /// Drain events, keeping only diagnostic kinds
    pub fn diagnostic_kinds(&mut self) -> Vec<ErrorKind> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Diagnostic(d) => Some(d.kind),
                _ => None,
            })
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
