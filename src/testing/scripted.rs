//! Scripted camera backend
//!
//! Every hardware result is posted synchronously into the reply queue, so a
//! test drives the session manager by pumping that queue. A shared journal
//! records each call the manager makes.

use crate::errors::HardwareError;
use crate::platform::{CameraBackend, CameraDevice, HardwareEvent, HardwareReply, HardwareSession, Surface};
use crate::types::SessionId;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// A call observed by the scripted hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareCall {
    Open(String),
    CreateSession {
        session: SessionId,
        targets: Vec<String>,
    },
    SetRepeating {
        session: SessionId,
        targets: Vec<String>,
    },
    StopRepeating(SessionId),
    CloseSession(SessionId),
    CloseDevice,
}

/// What the next open request produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    Disconnected,
    Error(i32),
    /// The request cannot be issued at all
    Rejected,
}

struct HardwareState {
    device_id: String,
    calls: Vec<HardwareCall>,
    reply: Option<HardwareReply>,
    open_outcome: OpenOutcome,
    configure_failures: u32,
    fail_repeating: bool,
    device_open: bool,
    revoked: bool,
    live: BTreeSet<SessionId>,
    max_live: usize,
    repeating: Option<(SessionId, Vec<String>)>,
    frame_number: u64,
}

impl HardwareState {
    fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            calls: Vec::new(),
            reply: None,
            open_outcome: OpenOutcome::Opened,
            configure_failures: 0,
            fail_repeating: false,
            device_open: false,
            revoked: false,
            live: BTreeSet::new(),
            max_live: 0,
            repeating: None,
            frame_number: 0,
        }
    }
}

type Shared = Arc<Mutex<HardwareState>>;

fn lock(state: &Shared) -> MutexGuard<'_, HardwareState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn labels(targets: &[Surface]) -> Vec<String> {
    targets.iter().map(|t| t.label().to_string()).collect()
}

/// [`CameraBackend`] whose behaviour is steered through [`ScriptedHardware`]
pub struct ScriptedBackend {
    state: Shared,
}

impl ScriptedBackend {
    pub fn with_hardware(device_id: &str) -> (Self, ScriptedHardware) {
        let state = Arc::new(Mutex::new(HardwareState::new(device_id)));
        (
            Self {
                state: state.clone(),
            },
            ScriptedHardware { state },
        )
    }
}

impl CameraBackend for ScriptedBackend {
    fn open(&mut self, device_id: &str, reply: HardwareReply) -> Result<(), HardwareError> {
        let event = {
            let mut state = lock(&self.state);
            state.calls.push(HardwareCall::Open(device_id.to_string()));
            state.reply = Some(reply.clone());
            match state.open_outcome {
                OpenOutcome::Rejected => {
                    return Err(HardwareError::Access("open rejected".to_string()))
                }
                OpenOutcome::Disconnected => HardwareEvent::DeviceDisconnected {
                    device_id: device_id.to_string(),
                },
                OpenOutcome::Error(code) => HardwareEvent::DeviceError {
                    device_id: device_id.to_string(),
                    code,
                },
                OpenOutcome::Opened => {
                    state.device_open = true;
                    state.revoked = false;
                    HardwareEvent::DeviceOpened(Box::new(ScriptedDevice {
                        id: device_id.to_string(),
                        state: self.state.clone(),
                        closed: false,
                    }))
                }
            }
        };
        reply.post(event);
        Ok(())
    }
}

struct ScriptedDevice {
    id: String,
    state: Shared,
    closed: bool,
}

impl CameraDevice for ScriptedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_session(
        &mut self,
        session: SessionId,
        targets: Vec<Surface>,
        reply: HardwareReply,
    ) -> Result<(), HardwareError> {
        let event = {
            let mut state = lock(&self.state);
            if self.closed || state.revoked {
                return Err(HardwareError::Closed);
            }
            state.calls.push(HardwareCall::CreateSession {
                session,
                targets: labels(&targets),
            });
            if state.configure_failures > 0 {
                state.configure_failures -= 1;
                HardwareEvent::SessionConfigureFailed {
                    session,
                    reason: "scripted configure failure".to_string(),
                }
            } else {
                state.live.insert(session);
                state.max_live = state.max_live.max(state.live.len());
                HardwareEvent::SessionConfigured(Box::new(ScriptedSession {
                    id: session,
                    state: self.state.clone(),
                    closed: false,
                }))
            }
        };
        reply.post(event);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = lock(&self.state);
        state.device_open = false;
        state.calls.push(HardwareCall::CloseDevice);
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Capture session handed out by [`ScriptedBackend`]
pub struct ScriptedSession {
    id: SessionId,
    state: Shared,
    closed: bool,
}

impl ScriptedSession {
    /// A session not attached to any backend
    pub fn detached(id: SessionId) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(HardwareState::new("detached"))),
            closed: false,
        }
    }
}

impl HardwareSession for ScriptedSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn set_repeating(&mut self, targets: &[Surface]) -> Result<(), HardwareError> {
        let mut state = lock(&self.state);
        if self.closed || state.revoked || state.fail_repeating {
            return Err(HardwareError::Access("camera device revoked".to_string()));
        }
        let targets = labels(targets);
        state.calls.push(HardwareCall::SetRepeating {
            session: self.id,
            targets: targets.clone(),
        });
        state.repeating = Some((self.id, targets));
        Ok(())
    }

    fn stop_repeating(&mut self) -> Result<(), HardwareError> {
        let mut state = lock(&self.state);
        state.calls.push(HardwareCall::StopRepeating(self.id));
        if matches!(&state.repeating, Some((id, _)) if *id == self.id) {
            state.repeating = None;
        }
        if state.revoked {
            return Err(HardwareError::Access("camera device revoked".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = lock(&self.state);
        state.live.remove(&self.id);
        if matches!(&state.repeating, Some((id, _)) if *id == self.id) {
            state.repeating = None;
        }
        state.calls.push(HardwareCall::CloseSession(self.id));
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Test-side control and inspection of a [`ScriptedBackend`]
#[derive(Clone)]
pub struct ScriptedHardware {
    state: Shared,
}

impl ScriptedHardware {
    pub fn calls(&self) -> Vec<HardwareCall> {
        lock(&self.state).calls.clone()
    }

    pub fn configure_requests(&self) -> Vec<(SessionId, Vec<String>)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                HardwareCall::CreateSession { session, targets } => {
                    Some((*session, targets.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Highest number of sessions that were ever live at once
    pub fn max_live_sessions(&self) -> usize {
        lock(&self.state).max_live
    }

    pub fn live_sessions(&self) -> Vec<SessionId> {
        lock(&self.state).live.iter().copied().collect()
    }

    pub fn repeating_session(&self) -> Option<SessionId> {
        lock(&self.state).repeating.as_ref().map(|(id, _)| *id)
    }

    /// Labels of the surfaces the current repeating request streams into
    pub fn repeating_targets(&self) -> Option<Vec<String>> {
        lock(&self.state)
            .repeating
            .as_ref()
            .map(|(_, targets)| targets.clone())
    }

    pub fn is_device_open(&self) -> bool {
        lock(&self.state).device_open
    }

    pub fn set_open_outcome(&self, outcome: OpenOutcome) {
        lock(&self.state).open_outcome = outcome;
    }

    pub fn fail_next_configure(&self) {
        lock(&self.state).configure_failures += 1;
    }

    pub fn fail_repeating(&self, fail: bool) {
        lock(&self.state).fail_repeating = fail;
    }

    /// Complete a frame on the current repeating session. Returns `false`
    /// when nothing is streaming.
    pub fn emit_frame(&self, sensor_sensitivity: Option<i32>) -> bool {
        match self.repeating_session() {
            Some(session) => self.emit_frame_for(session, sensor_sensitivity),
            None => false,
        }
    }

    /// Complete a frame attributed to `session`, live or not
    pub fn emit_frame_for(&self, session: SessionId, sensor_sensitivity: Option<i32>) -> bool {
        let (reply, frame_number) = {
            let mut state = lock(&self.state);
            state.frame_number += 1;
            (state.reply.clone(), state.frame_number)
        };
        reply.is_some_and(|r| r.capture_completed(session, frame_number, sensor_sensitivity))
    }

    /// Revoke the open device and report the disconnect
    pub fn disconnect(&self) -> bool {
        let (reply, device_id) = {
            let mut state = lock(&self.state);
            state.revoked = true;
            (state.reply.clone(), state.device_id.clone())
        };
        reply.is_some_and(|r| r.post(HardwareEvent::DeviceDisconnected { device_id }))
    }

    /// Report a disconnect for an arbitrary device id without revoking
    pub fn disconnect_device(&self, device_id: &str) -> bool {
        let reply = lock(&self.state).reply.clone();
        reply.is_some_and(|r| {
            r.post(HardwareEvent::DeviceDisconnected {
                device_id: device_id.to_string(),
            })
        })
    }

    pub fn device_error(&self, code: i32) -> bool {
        let (reply, device_id) = {
            let mut state = lock(&self.state);
            state.revoked = true;
            (state.reply.clone(), state.device_id.clone())
        };
        reply.is_some_and(|r| r.post(HardwareEvent::DeviceError { device_id, code }))
    }
}
