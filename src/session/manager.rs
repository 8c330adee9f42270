//! Mode state machine of the capture core
//!
//! The [`SessionManager`] is the single owner of camera and recorder
//! resources. It runs on one thread and handles one [`Message`] at a time:
//! commands from the controlling thread and asynchronous hardware results
//! share the same queue, so no handler ever observes a partially applied
//! transition.
//!
//! A command that arrives while an open or configure is outstanding is
//! deferred and replayed, in order, once the result is in.

use super::dispatcher::{route_capture, CaptureRoute};
use super::events::{Notifier, SessionEvent, StatusSnapshot};
use super::messages::{Command, Message};
use super::state::{ConfigureReason, DeviceHandle, LiveSession, PendingConfigure, Stage};
use crate::errors::CaptureError;
use crate::permissions::PermissionStatus;
use crate::platform::{CameraBackend, CameraDevice, HardwareEvent, HardwareReply, HardwareSession, Surface};
use crate::recording::{RecordingSink, SinkState, VideoParams};
use crate::telemetry::TelemetrySink;
use crate::timing::WallClock;
use crate::types::{CaptureMode, SessionId, SinkKind, SinkSet, TelemetrySample};
use std::collections::VecDeque;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Collaborators injected into a session manager
pub struct SessionParts {
    pub device_id: String,
    pub backend: Box<dyn CameraBackend>,
    pub recorder: Box<dyn RecordingSink>,
    pub telemetry: Box<dyn TelemetrySink>,
    pub clock: Arc<dyn WallClock>,
    /// Output file handed to the recorder on every start; overwritten
    pub recording_path: PathBuf,
    pub video_params: VideoParams,
}

/// Whether the worker keeps consuming messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct SessionManager {
    device_id: String,
    backend: Box<dyn CameraBackend>,
    recorder: Box<dyn RecordingSink>,
    telemetry: Box<dyn TelemetrySink>,
    clock: Arc<dyn WallClock>,
    recording_path: PathBuf,
    video_params: VideoParams,
    reply: HardwareReply,
    notifier: Notifier,

    permission: PermissionStatus,
    preview: Option<Surface>,
    recorder_surface: Option<Surface>,
    // Declared before `device` so a live session is released first on drop.
    stage: Stage,
    device: DeviceHandle,
    deferred: VecDeque<Command>,
    next_session: u64,

    samples_logged: u64,
    frames_discarded: u64,
    telemetry_errors: u64,
    telemetry_warned: bool,
    resume_retried: bool,
    reported_mode: CaptureMode,
    shut_down: bool,
}

impl SessionManager {
    /// `reply` must post into the queue this manager is fed from.
    pub fn new(parts: SessionParts, reply: HardwareReply, notifier: Notifier) -> Self {
        Self {
            device_id: parts.device_id,
            backend: parts.backend,
            recorder: parts.recorder,
            telemetry: parts.telemetry,
            clock: parts.clock,
            recording_path: parts.recording_path,
            video_params: parts.video_params,
            reply,
            notifier,
            permission: PermissionStatus::NotDetermined,
            preview: None,
            recorder_surface: None,
            stage: Stage::Idle,
            device: DeviceHandle::default(),
            deferred: VecDeque::new(),
            next_session: 0,
            samples_logged: 0,
            frames_discarded: 0,
            telemetry_errors: 0,
            telemetry_warned: false,
            resume_retried: false,
            reported_mode: CaptureMode::Idle,
            shut_down: false,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.stage.mode()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Commands waiting on an outstanding hardware result
    pub fn deferred_commands(&self) -> usize {
        self.deferred.len()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.notifier.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifier.subscribe()
    }

    /// Process one message to completion
    pub fn handle(&mut self, message: Message) -> Flow {
        match message {
            Message::Command(command) => self.on_command(command),
            Message::Hardware(event) => self.on_hardware(event),
        }
        self.replay_deferred();
        self.publish();

        if self.shut_down {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Terminal teardown: recorder, session and device are released and
    /// the telemetry log is closed. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::info!("Shutting down capture session");
        self.teardown();
        self.deferred.clear();
        self.preview = None;
        if let Err(e) = self.telemetry.close() {
            log::warn!("Closing telemetry log failed: {}", e);
        }
        self.shut_down = true;
        self.publish();
        self.notifier.emit(SessionEvent::ShutDown);
    }

    fn on_command(&mut self, command: Command) {
        if self.shut_down {
            log::debug!("Ignoring {} after shutdown", command.name());
            return;
        }
        if self.stage.in_flight() && command.waits_for_transition() {
            log::debug!("Deferring {} while {}", command.name(), self.stage.name());
            self.deferred.push_back(command);
            return;
        }
        self.apply(command);
    }

    fn replay_deferred(&mut self) {
        while !self.shut_down && !self.stage.in_flight() {
            let Some(command) = self.deferred.pop_front() else {
                break;
            };
            log::debug!("Replaying deferred {}", command.name());
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::SurfaceReady(surface) => self.surface_ready(surface),
            Command::SurfaceLost => self.surface_lost(),
            Command::StartRecording => self.start_recording(),
            Command::StopRecording => self.stop_recording(),
            Command::ToggleRecording => {
                if self.stage.mode() == CaptureMode::Recording {
                    self.stop_recording();
                } else {
                    self.start_recording();
                }
            }
            Command::PermissionGranted => {
                self.permission = PermissionStatus::Granted;
                self.open_device();
            }
            Command::PermissionDenied => {
                self.permission = PermissionStatus::Denied;
                self.report(&CaptureError::PermissionDenied(
                    "camera permission was denied".to_string(),
                ));
            }
            Command::Shutdown => self.shutdown(),
        }
    }

    fn on_hardware(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::DeviceOpened(device) => self.device_opened(device),
            HardwareEvent::DeviceDisconnected { device_id } => {
                self.device_lost(&device_id, "disconnected".to_string())
            }
            HardwareEvent::DeviceError { device_id, code } => {
                self.device_lost(&device_id, format!("reported error {code}"))
            }
            HardwareEvent::SessionConfigured(hw) => self.session_configured(hw),
            HardwareEvent::SessionConfigureFailed { session, reason } => {
                self.session_configure_failed(session, reason)
            }
            HardwareEvent::CaptureCompleted {
                session,
                sensor_sensitivity,
                ..
            } => self.capture_completed(session, sensor_sensitivity),
        }
    }

    fn surface_ready(&mut self, surface: Surface) {
        log::info!("Preview surface '{}' ready", surface.label());
        self.preview = Some(surface);

        match &self.stage {
            Stage::Idle if self.device.is_open() => self.configure(ConfigureReason::Preview),
            Stage::Idle => match self.permission {
                PermissionStatus::Granted => self.open_device(),
                PermissionStatus::Denied => self.report(&CaptureError::PermissionDenied(
                    "camera permission was denied; preview unavailable".to_string(),
                )),
                PermissionStatus::NotDetermined => {
                    log::debug!("Preview surface waiting for camera permission")
                }
            },
            Stage::Previewing(_) => {
                // Rebind the preview to the new surface.
                if let Stage::Previewing(session) = mem::replace(&mut self.stage, Stage::Idle) {
                    session.close();
                }
                self.configure(ConfigureReason::ResumePreview);
            }
            other => log::debug!(
                "Surface replaced while {}; used by the next session",
                other.name()
            ),
        }
    }

    /// The display surface is gone: stop streaming but keep the device.
    fn surface_lost(&mut self) {
        log::info!("Preview surface lost");
        self.preview = None;

        match mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Recording { mut session, .. } => {
                if let Err(e) = session.stop_repeating() {
                    log::warn!("Stop repeating on session {} failed: {}", session.id(), e);
                }
                self.finish_recorder();
                session.close();
            }
            Stage::Previewing(session) => session.close(),
            other => self.stage = other,
        }
    }

    fn open_device(&mut self) {
        if self.device.is_open() || !matches!(self.stage, Stage::Idle) {
            return;
        }
        if !self.permission.is_granted() {
            self.report(&CaptureError::PermissionDenied(
                "camera permission has not been granted".to_string(),
            ));
            return;
        }

        match self.backend.open(&self.device_id, self.reply.clone()) {
            Ok(()) => {
                log::info!("Opening camera {}", self.device_id);
                self.stage = Stage::Opening;
            }
            Err(e) => self.report(&CaptureError::DeviceAccess(format!(
                "cannot open camera {}: {}",
                self.device_id, e
            ))),
        }
    }

    fn device_opened(&mut self, mut device: Box<dyn CameraDevice>) {
        if self.shut_down || !matches!(self.stage, Stage::Opening) {
            log::warn!("Closing camera {} that is no longer wanted", device.id());
            device.close();
            return;
        }

        let device_id = device.id().to_string();
        self.device.attach(device);
        self.stage = Stage::Idle;
        log::info!("Camera {} opened", device_id);
        self.notifier.emit(SessionEvent::DeviceOpened { device_id });

        if self.preview.is_some() {
            self.configure(ConfigureReason::Preview);
        } else {
            log::debug!("Camera open, waiting for preview surface");
        }
    }

    fn device_lost(&mut self, device_id: &str, what: String) {
        if device_id != self.device_id {
            log::warn!("Ignoring event for unrelated camera {}: {}", device_id, what);
            return;
        }
        if self.shut_down {
            return;
        }

        let while_opening = matches!(self.stage, Stage::Opening);
        self.teardown();
        let message = if while_opening {
            format!("camera {device_id} {what} while opening")
        } else {
            format!("camera {device_id} {what}")
        };
        self.report(&CaptureError::DeviceAccess(message));
    }

    /// Request a session for `reason`'s sink set. The stage must not
    /// hold a live session.
    fn configure(&mut self, reason: ConfigureReason) {
        let targets = match self.targets_for(reason.sinks()) {
            Ok(targets) => targets,
            Err(e) => {
                self.abandon_configure(reason);
                self.report(&e);
                return;
            }
        };

        self.next_session += 1;
        let request = SessionId(self.next_session);

        let Some(device) = self.device.device_mut() else {
            self.abandon_configure(reason);
            self.report(&CaptureError::DeviceAccess(
                "no camera device is open".to_string(),
            ));
            return;
        };

        match device.create_session(request, targets, self.reply.clone()) {
            Ok(()) => {
                log::debug!("Requested session {} for {}", request, reason.sinks());
                self.stage = Stage::Configuring(PendingConfigure { request, reason });
            }
            Err(e) => {
                self.teardown();
                self.report(&CaptureError::from(e));
            }
        }
    }

    fn abandon_configure(&mut self, reason: ConfigureReason) {
        self.stage = Stage::Idle;
        if reason == ConfigureReason::Record {
            self.finish_recorder();
        }
    }

    fn targets_for(&self, sinks: SinkSet) -> Result<Vec<Surface>, CaptureError> {
        sinks
            .kinds()
            .iter()
            .map(|kind| match kind {
                SinkKind::Preview => self.preview.clone().ok_or_else(|| {
                    CaptureError::NotReady("preview surface is not available".to_string())
                }),
                SinkKind::Recorder => self.recorder_surface.clone().ok_or_else(|| {
                    CaptureError::NotReady("recorder has not been prepared".to_string())
                }),
            })
            .collect()
    }

    fn session_configured(&mut self, mut hw: Box<dyn HardwareSession>) {
        let id = hw.id();
        let pending = match &self.stage {
            Stage::Configuring(pending) if pending.request == id => *pending,
            _ => {
                log::warn!("Closing stale session {}", id);
                hw.close();
                return;
            }
        };

        let mut session = LiveSession::new(hw, pending.reason.sinks());
        let targets = match self.targets_for(session.sinks()) {
            Ok(targets) => targets,
            Err(e) => {
                session.close();
                self.abandon_configure(pending.reason);
                self.report(&e);
                return;
            }
        };

        if let Err(e) = session.start_repeating(&targets) {
            session.close();
            self.teardown();
            self.report(&CaptureError::from(e));
            return;
        }

        match pending.reason {
            ConfigureReason::Preview | ConfigureReason::ResumePreview => {
                log::info!("Preview running on session {}", id);
                self.resume_retried = false;
                self.stage = Stage::Previewing(session);
            }
            ConfigureReason::Record => match self.recorder.start() {
                Ok(()) => {
                    let since_ms = self.clock.now_millis();
                    log::info!("Recording started on session {}", id);
                    self.telemetry_warned = false;
                    self.stage = Stage::Recording { session, since_ms };
                }
                Err(e) => {
                    session.close();
                    self.finish_recorder();
                    self.stage = Stage::Idle;
                    self.report(&e);
                    self.configure(ConfigureReason::ResumePreview);
                }
            },
        }
    }

    fn session_configure_failed(&mut self, session: SessionId, reason: String) {
        let pending = match &self.stage {
            Stage::Configuring(pending) if pending.request == session => *pending,
            _ => {
                log::debug!("Ignoring configure failure of stale session {}", session);
                return;
            }
        };

        self.stage = Stage::Idle;
        self.report(&CaptureError::ConfigureFailed(format!(
            "session {session}: {reason}"
        )));
        match pending.reason {
            ConfigureReason::Record => {
                self.finish_recorder();
                self.configure(ConfigureReason::ResumePreview);
            }
            // One retry; after that the preview waits for the next surface.
            ConfigureReason::ResumePreview if !self.resume_retried => {
                log::warn!("Retrying preview rebuild after session {} failed", session);
                self.resume_retried = true;
                self.configure(ConfigureReason::ResumePreview);
            }
            ConfigureReason::ResumePreview | ConfigureReason::Preview => {}
        }
    }

    fn capture_completed(&mut self, session: SessionId, sensor_sensitivity: Option<i32>) {
        match route_capture(&self.stage, session, sensor_sensitivity) {
            CaptureRoute::Log(value) => {
                let sample = TelemetrySample::new(self.clock.now_millis(), value);
                match self.telemetry.record(sample) {
                    Ok(()) => self.samples_logged += 1,
                    Err(e) => {
                        self.telemetry_errors += 1;
                        if !self.telemetry_warned {
                            self.telemetry_warned = true;
                            self.report(&e);
                        }
                    }
                }
            }
            CaptureRoute::Discard(reason) => {
                self.frames_discarded += 1;
                log::trace!("Discarded frame of session {}: {:?}", session, reason);
            }
        }
    }

    fn start_recording(&mut self) {
        match &self.stage {
            Stage::Recording { .. } => {
                log::debug!("Start ignored: already recording");
                return;
            }
            Stage::Previewing(_) => {}
            other => {
                let message = format!("cannot record while {}", other.name());
                self.report(&CaptureError::NotReady(message));
                return;
            }
        }

        let surface = match self.recorder.prepare(&self.recording_path, &self.video_params) {
            Ok(surface) => surface,
            Err(e) => {
                self.recorder.reset();
                self.report(&e);
                return;
            }
        };
        self.recorder_surface = Some(surface);

        if let Stage::Previewing(session) = mem::replace(&mut self.stage, Stage::Idle) {
            session.close();
        }
        self.configure(ConfigureReason::Record);
    }

    fn stop_recording(&mut self) {
        let (mut session, since_ms) = match mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Recording { session, since_ms } => (session, since_ms),
            other => {
                log::debug!("Stop ignored while {}", other.name());
                self.stage = other;
                return;
            }
        };

        if let Err(e) = session.stop_repeating() {
            log::warn!("Stop repeating on session {} failed: {}", session.id(), e);
        }
        self.finish_recorder();
        session.close();
        log::info!(
            "Recording stopped after {} ms",
            self.clock.now_millis().saturating_sub(since_ms)
        );

        self.configure(ConfigureReason::ResumePreview);
    }

    /// Stop the recorder if it is running, then return it to unconfigured.
    fn finish_recorder(&mut self) {
        self.recorder_surface = None;
        match self.recorder.state() {
            SinkState::Unconfigured => return,
            SinkState::Active => match self.recorder.stop() {
                Ok(stats) => log::info!(
                    "Recorder stopped: {} frames -> {}",
                    stats.video_frames,
                    stats.output_path
                ),
                Err(e) => self.report(&e),
            },
            SinkState::Prepared | SinkState::Stopped => {}
        }
        self.recorder.reset();
    }

    /// Release everything and go idle. Pending hardware results arriving
    /// later are treated as stale.
    fn teardown(&mut self) {
        match mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Recording { mut session, .. } => {
                if let Err(e) = session.stop_repeating() {
                    log::debug!("Stop repeating during teardown failed: {}", e);
                }
                self.finish_recorder();
                session.close();
            }
            Stage::Previewing(session) => session.close(),
            Stage::Configuring(_) | Stage::Opening | Stage::Idle => {}
        }
        self.finish_recorder();

        if let Some(device_id) = self.device.close() {
            log::info!("Camera {} closed", device_id);
            self.notifier.emit(SessionEvent::DeviceClosed { device_id });
        }
    }

    fn report(&self, error: &CaptureError) {
        log::warn!("{}", error);
        self.notifier.diagnostic(error);
    }

    fn publish(&mut self) {
        let mode = self.stage.mode();
        let recording_since_ms = self.stage.recording_since();
        let active_sinks = self
            .stage
            .live_session()
            .filter(|session| session.is_repeating())
            .map(LiveSession::sinks);
        debug_assert!(active_sinks.is_none() || active_sinks == mode.required_sinks());

        let device_open = self.device.is_open();
        let surface_ready = self.preview.is_some();
        let permission = self.permission;
        let (samples_logged, frames_discarded, telemetry_errors) = (
            self.samples_logged,
            self.frames_discarded,
            self.telemetry_errors,
        );
        let shut_down = self.shut_down;

        self.notifier.update(|status| {
            status.mode = mode;
            status.active_sinks = active_sinks;
            status.device_open = device_open;
            status.surface_ready = surface_ready;
            status.permission = permission;
            status.recording_since_ms = recording_since_ms;
            status.samples_logged = samples_logged;
            status.frames_discarded = frames_discarded;
            status.telemetry_errors = telemetry_errors;
            status.shut_down = shut_down;
        });

        if mode != self.reported_mode {
            log::info!("Mode {} -> {}", self.reported_mode, mode);
            self.reported_mode = mode;
            self.notifier.emit(SessionEvent::ModeChanged {
                mode,
                recording_since_ms,
            });
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ErrorKind;
    use crate::recording::SinkState;
    use crate::session::{Command, SessionEvent};
    use crate::testing::{Harness, HardwareCall};
    use crate::types::{CaptureMode, SinkSet};

    fn previewing() -> Harness {
        let mut h = Harness::new();
        h.bring_up_preview();
        assert_eq!(h.status().mode, CaptureMode::Previewing);
        h
    }

    #[test]
    fn test_open_waits_for_permission() {
        let mut h = Harness::new();
        h.command(Command::SurfaceReady(h.preview_surface()));
        assert!(h.hardware.calls().is_empty());
        assert_eq!(h.status().mode, CaptureMode::Idle);

        h.command(Command::PermissionGranted);
        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Previewing);
        assert_eq!(status.active_sinks, Some(SinkSet::Preview));
        assert!(status.device_open);
    }

    #[test]
    fn test_granted_before_surface_configures_on_surface() {
        let mut h = Harness::new();
        h.command(Command::PermissionGranted);
        assert!(h.status().device_open);
        assert_eq!(h.status().mode, CaptureMode::Idle);
        assert!(h.hardware.configure_requests().is_empty());

        h.command(Command::SurfaceReady(h.preview_surface()));
        assert_eq!(h.status().mode, CaptureMode::Previewing);
    }

    #[test]
    fn test_denied_permission_never_opens() {
        let mut h = Harness::new();
        h.command(Command::PermissionDenied);
        h.command(Command::SurfaceReady(h.preview_surface()));
        assert!(h.hardware.calls().is_empty());
        let kinds = h.diagnostic_kinds();
        assert_eq!(kinds, vec![ErrorKind::PermissionDenied, ErrorKind::PermissionDenied]);
    }

    #[test]
    fn test_start_records_and_logs() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Recording);
        assert_eq!(status.active_sinks, Some(SinkSet::PreviewAndRecorder));
        assert_eq!(status.recording_since_ms, Some(h.clock.now()));
        assert_eq!(h.sink.state(), SinkState::Active);

        h.clock.advance(33);
        h.emit_frame(Some(100));
        h.clock.advance(33);
        h.emit_frame(Some(110));
        assert_eq!(h.telemetry.values(), vec![100, 110]);
        assert!(h.hardware.max_live_sessions() <= 1);
    }

    #[test]
    fn test_start_while_configuring_is_deferred() {
        let mut h = Harness::new();
        h.send(Command::PermissionGranted);
        h.send(Command::SurfaceReady(h.preview_surface()));
        h.send(Command::StartRecording);
        h.pump();
        assert_eq!(h.status().mode, CaptureMode::Recording);
        assert_eq!(h.manager.deferred_commands(), 0);
    }

    #[test]
    fn test_stop_during_record_configure_runs_after() {
        let mut h = previewing();
        h.send(Command::StartRecording);
        h.send(Command::StopRecording);
        h.pump();

        assert_eq!(h.status().mode, CaptureMode::Previewing);
        assert_eq!(h.sink.starts(), 1);
        assert_eq!(h.sink.stops(), 1);
        assert_eq!(h.hardware.max_live_sessions(), 1);
    }

    #[test]
    fn test_start_when_idle_is_not_ready() {
        let mut h = Harness::new();
        h.command(Command::StartRecording);
        assert_eq!(h.status().mode, CaptureMode::Idle);
        assert_eq!(h.diagnostic_kinds(), vec![ErrorKind::NotReady]);
        assert_eq!(h.sink.prepares(), 0);
    }

    #[test]
    fn test_stop_while_previewing_is_silent_noop() {
        let mut h = previewing();
        h.events();
        let requests = h.hardware.configure_requests();
        let calls = h.hardware.calls();
        let resets = h.sink.resets();

        h.command(Command::StopRecording);

        assert!(h.diagnostic_kinds().is_empty());
        assert_eq!(h.hardware.configure_requests(), requests);
        assert_eq!(h.hardware.calls(), calls);
        assert_eq!(h.sink.stops(), 0);
        assert_eq!(h.sink.resets(), resets);
        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Previewing);
        assert_eq!(status.active_sinks, Some(SinkSet::Preview));
    }

    #[test]
    fn test_failed_preview_rebuild_is_retried_once() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        h.events();

        h.hardware.fail_next_configure();
        h.command(Command::StopRecording);

        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Previewing);
        assert_eq!(status.active_sinks, Some(SinkSet::Preview));
        assert_eq!(h.diagnostic_kinds(), vec![ErrorKind::ConfigureFailed]);
    }

    #[test]
    fn test_second_rebuild_failure_waits_for_surface() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        h.events();

        h.hardware.fail_next_configure();
        h.hardware.fail_next_configure();
        h.command(Command::StopRecording);

        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Idle);
        assert!(status.device_open);
        assert_eq!(
            h.diagnostic_kinds(),
            vec![ErrorKind::ConfigureFailed, ErrorKind::ConfigureFailed]
        );

        h.command(Command::SurfaceReady(h.preview_surface()));
        assert_eq!(h.status().mode, CaptureMode::Previewing);
    }

    #[test]
    fn test_toggle_flips_recording() {
        let mut h = previewing();
        h.command(Command::ToggleRecording);
        assert_eq!(h.status().mode, CaptureMode::Recording);
        h.command(Command::ToggleRecording);
        assert_eq!(h.status().mode, CaptureMode::Previewing);
    }

    #[test]
    fn test_stop_discards_in_flight_frames() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        let recording_session = h.hardware.repeating_session().unwrap();
        h.emit_frame(Some(100));

        h.command(Command::StopRecording);
        h.emit_frame_for(recording_session, Some(105));
        h.emit_frame(Some(107));

        assert_eq!(h.telemetry.values(), vec![100]);
        assert_eq!(h.status().frames_discarded, 2);
        assert_eq!(h.status().active_sinks, Some(SinkSet::Preview));
    }

    #[test]
    fn test_frame_without_metadata_is_skipped() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        h.emit_frame(None);
        h.emit_frame(Some(90));
        assert_eq!(h.telemetry.values(), vec![90]);
    }

    #[test]
    fn test_prepare_failure_keeps_preview_session() {
        let mut h = previewing();
        let requests = h.hardware.configure_requests().len();
        h.sink.fail_prepare(true);
        h.command(Command::StartRecording);

        assert_eq!(h.status().mode, CaptureMode::Previewing);
        assert_eq!(h.hardware.configure_requests().len(), requests);
        assert_eq!(h.diagnostic_kinds(), vec![ErrorKind::Prepare]);
    }

    #[test]
    fn test_sink_start_failure_rebuilds_preview() {
        let mut h = previewing();
        h.sink.fail_start(true);
        h.command(Command::StartRecording);

        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Previewing);
        assert_eq!(status.active_sinks, Some(SinkSet::Preview));
        assert_eq!(h.sink.state(), SinkState::Unconfigured);
        assert_eq!(h.diagnostic_kinds(), vec![ErrorKind::SinkStart]);
        assert_eq!(h.hardware.max_live_sessions(), 1);
    }

    #[test]
    fn test_record_configure_failure_returns_to_preview() {
        let mut h = previewing();
        h.hardware.fail_next_configure();
        h.command(Command::StartRecording);

        assert_eq!(h.status().mode, CaptureMode::Previewing);
        assert_eq!(h.status().active_sinks, Some(SinkSet::Preview));
        assert_eq!(h.sink.state(), SinkState::Unconfigured);
        assert_eq!(h.diagnostic_kinds(), vec![ErrorKind::ConfigureFailed]);
    }

    #[test]
    fn test_preview_configure_failure_stays_idle() {
        let mut h = Harness::new();
        h.hardware.fail_next_configure();
        h.bring_up_preview();
        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Idle);
        assert!(status.device_open);
        assert_eq!(h.diagnostic_kinds(), vec![ErrorKind::ConfigureFailed]);
    }

    #[test]
    fn test_disconnect_while_recording_tears_down() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        h.emit_frame(Some(100));
        h.disconnect();

        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Idle);
        assert!(!status.device_open);
        assert_eq!(h.sink.stops(), 1);
        assert_eq!(h.sink.state(), SinkState::Unconfigured);
        assert!(h.hardware.live_sessions().is_empty());
        assert!(h.diagnostic_kinds().contains(&ErrorKind::DeviceAccess));

        h.emit_frame(Some(120));
        assert_eq!(h.telemetry.values(), vec![100]);
    }

    #[test]
    fn test_disconnect_while_opening() {
        let mut h = Harness::new();
        h.hardware.set_open_outcome(crate::testing::OpenOutcome::Disconnected);
        h.bring_up_preview();
        assert_eq!(h.status().mode, CaptureMode::Idle);
        assert!(!h.status().device_open);
        assert_eq!(h.diagnostic_kinds(), vec![ErrorKind::DeviceAccess]);
    }

    #[test]
    fn test_repeating_access_error_is_terminal() {
        let mut h = Harness::new();
        h.hardware.fail_repeating(true);
        h.bring_up_preview();
        assert_eq!(h.status().mode, CaptureMode::Idle);
        assert!(!h.status().device_open);
        assert!(h.hardware.live_sessions().is_empty());
    }

    #[test]
    fn test_surface_lost_keeps_device_open() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        h.command(Command::SurfaceLost);

        let status = h.status();
        assert_eq!(status.mode, CaptureMode::Idle);
        assert!(status.device_open);
        assert_eq!(h.sink.stops(), 1);

        h.command(Command::SurfaceReady(h.preview_surface()));
        assert_eq!(h.status().mode, CaptureMode::Previewing);
    }

    #[test]
    fn test_foreign_device_event_is_ignored() {
        let mut h = previewing();
        h.hardware.disconnect_device("other-camera");
        h.pump();
        assert_eq!(h.status().mode, CaptureMode::Previewing);
        assert!(h.diagnostic_kinds().is_empty());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut h = previewing();
        h.command(Command::StartRecording);
        h.command(Command::Shutdown);

        let status = h.status();
        assert!(status.shut_down);
        assert_eq!(status.mode, CaptureMode::Idle);
        assert!(!status.device_open);
        assert!(h.telemetry.is_closed());
        assert_eq!(h.sink.stops(), 1);
        assert!(h.hardware.calls().contains(&HardwareCall::CloseDevice));
        assert!(h.events().contains(&SessionEvent::ShutDown));

        // Nothing restarts after shutdown.
        h.command(Command::PermissionGranted);
        assert!(!h.status().device_open);
    }

    #[test]
    fn test_mode_changes_are_announced_once() {
        let mut h = previewing();
        h.events();
        h.command(Command::StartRecording);
        h.command(Command::StopRecording);
        let modes: Vec<CaptureMode> = h
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::ModeChanged { mode, .. } => Some(mode),
                _ => None,
            })
            .collect();
        assert_eq!(modes, vec![CaptureMode::Recording, CaptureMode::Previewing]);
    }
}
