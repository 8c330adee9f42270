//! Session worker thread and per-frame callback routing

use super::manager::{Flow, SessionManager};
use super::messages::Message;
use super::state::Stage;
use crate::types::SessionId;
use crossbeam_channel::Receiver;

pub(crate) const WORKER_THREAD_NAME: &str = "isocam-session-worker";

/// Where a completed frame's sensor reading goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRoute {
    /// Append this ISO value to the telemetry log
    Log(i32),
    Discard(DiscardReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Mode is not recording; stopping flips the mode first, so in-flight
    /// frames of the old recording session land here
    NotRecording,
    /// Frame belongs to a session that is no longer live
    StaleSession,
    /// Frame carried no sensor sensitivity
    NoMetadata,
}

/// Decide whether a completed frame is logged. A frame is logged only when
/// recording, from the live recording session, with a sensitivity reading.
pub(crate) fn route_capture(
    stage: &Stage,
    session: SessionId,
    sensor_sensitivity: Option<i32>,
) -> CaptureRoute {
    let live = match stage {
        Stage::Recording { session: live, .. } => live,
        _ => return CaptureRoute::Discard(DiscardReason::NotRecording),
    };
    if live.id() != session {
        return CaptureRoute::Discard(DiscardReason::StaleSession);
    }
    match sensor_sensitivity {
        Some(value) => CaptureRoute::Log(value),
        None => CaptureRoute::Discard(DiscardReason::NoMetadata),
    }
}

/// Body of the session worker: drain the queue in FIFO order until a
/// shutdown has been processed.
pub(crate) fn run_worker(mut manager: SessionManager, rx: Receiver<Message>) {
    log::debug!("Session worker started");
    for message in rx.iter() {
        if manager.handle(message) == Flow::Stop {
            break;
        }
    }
    if !manager.is_shut_down() {
        manager.shutdown();
    }
    log::debug!("Session worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{ConfigureReason, LiveSession, PendingConfigure};
    use crate::testing::ScriptedSession;
    use crate::types::SinkSet;

    fn recording(id: u64) -> Stage {
        Stage::Recording {
            session: LiveSession::new(
                Box::new(ScriptedSession::detached(SessionId(id))),
                SinkSet::PreviewAndRecorder,
            ),
            since_ms: 0,
        }
    }

    #[test]
    fn test_logs_only_live_recording_session() {
        let stage = recording(3);
        assert_eq!(route_capture(&stage, SessionId(3), Some(120)), CaptureRoute::Log(120));
        assert_eq!(
            route_capture(&stage, SessionId(2), Some(120)),
            CaptureRoute::Discard(DiscardReason::StaleSession)
        );
        assert_eq!(
            route_capture(&stage, SessionId(3), None),
            CaptureRoute::Discard(DiscardReason::NoMetadata)
        );
    }

    #[test]
    fn test_discards_outside_recording() {
        let previewing = Stage::Previewing(LiveSession::new(
            Box::new(ScriptedSession::detached(SessionId(1))),
            SinkSet::Preview,
        ));
        let configuring = Stage::Configuring(PendingConfigure {
            request: SessionId(2),
            reason: ConfigureReason::Record,
        });
        for stage in [Stage::Idle, Stage::Opening, previewing, configuring] {
            assert_eq!(
                route_capture(&stage, SessionId(1), Some(100)),
                CaptureRoute::Discard(DiscardReason::NotRecording)
            );
        }
    }
}
