//! Property-based tests for the capture mode state machine
//!
//! Random interleavings of commands and hardware events are applied to a
//! session manager over scripted hardware. After every step the mode, the
//! sink set actually streaming, and the telemetry log must agree.

use isocam::recording::SinkState;
use isocam::session::Command;
use isocam::testing::Harness;
use isocam::{CaptureMode, SinkSet};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    SurfaceReady,
    SurfaceLost,
    Start,
    Stop,
    Toggle,
    Grant,
    Deny,
    Frame(Option<i32>),
    /// Queue two commands before the manager sees either
    Burst(bool, bool),
    Disconnect,
    DeviceError,
    FailNextConfigure,
    FailPrepare(bool),
    FailStart(bool),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => Just(Step::SurfaceReady),
        1 => Just(Step::SurfaceLost),
        4 => Just(Step::Start),
        3 => Just(Step::Stop),
        2 => Just(Step::Toggle),
        2 => Just(Step::Grant),
        1 => Just(Step::Deny),
        6 => proptest::option::weighted(0.9, 50i32..3200).prop_map(Step::Frame),
        2 => (any::<bool>(), any::<bool>()).prop_map(|(a, b)| Step::Burst(a, b)),
        1 => Just(Step::Disconnect),
        1 => Just(Step::DeviceError),
        1 => Just(Step::FailNextConfigure),
        1 => any::<bool>().prop_map(Step::FailPrepare),
        1 => any::<bool>().prop_map(Step::FailStart),
    ]
}

fn record_command(start: bool) -> Command {
    if start {
        Command::StartRecording
    } else {
        Command::StopRecording
    }
}

fn expected_targets(sinks: SinkSet) -> Vec<String> {
    match sinks {
        SinkSet::Preview => vec!["preview".to_string()],
        SinkSet::PreviewAndRecorder => vec!["preview".to_string(), "recorder".to_string()],
    }
}

/// Apply one step; returns the ISO value that must have been logged
fn apply(h: &mut Harness, step: &Step) -> Option<i32> {
    match step {
        Step::SurfaceReady => h.command(Command::SurfaceReady(h.preview_surface())),
        Step::SurfaceLost => h.command(Command::SurfaceLost),
        Step::Start => h.command(Command::StartRecording),
        Step::Stop => h.command(Command::StopRecording),
        Step::Toggle => h.command(Command::ToggleRecording),
        Step::Grant => h.command(Command::PermissionGranted),
        Step::Deny => h.command(Command::PermissionDenied),
        Step::Frame(iso) => {
            let recording = h.status().mode == CaptureMode::Recording;
            let sent = h.emit_frame(*iso);
            if recording && sent {
                return *iso;
            }
        }
        Step::Burst(a, b) => {
            h.send(record_command(*a));
            h.send(record_command(*b));
            h.pump();
        }
        Step::Disconnect => h.disconnect(),
        Step::DeviceError => {
            h.hardware.device_error(4);
            h.pump();
        }
        Step::FailNextConfigure => h.hardware.fail_next_configure(),
        Step::FailPrepare(fail) => h.sink.fail_prepare(*fail),
        Step::FailStart(fail) => h.sink.fail_start(*fail),
    }
    None
}

fn check(h: &Harness) -> Result<(), TestCaseError> {
    let status = h.status();

    // A live repeating request always matches the mode's sink set.
    prop_assert!(
        status.active_sinks.is_none() || status.active_sinks == status.mode.required_sinks(),
        "mode {} streaming into {:?}",
        status.mode,
        status.active_sinks
    );
    match status.active_sinks {
        Some(sinks) => prop_assert_eq!(h.hardware.repeating_targets(), Some(expected_targets(sinks))),
        None => prop_assert_eq!(h.hardware.repeating_targets(), None),
    }
    if status.mode == CaptureMode::Idle {
        prop_assert_eq!(status.active_sinks, None);
    }

    prop_assert!(h.hardware.max_live_sessions() <= 1, "overlapping sessions");
    prop_assert!(h.hardware.live_sessions().len() <= 1);

    // The recorder runs exactly while recording.
    prop_assert_eq!(
        h.sink.state() == SinkState::Active,
        status.mode == CaptureMode::Recording
    );
    prop_assert_eq!(status.recording_since_ms.is_some(), status.mode == CaptureMode::Recording);

    // Nothing is left waiting once the hardware queue is drained.
    prop_assert_eq!(h.manager.deferred_commands(), 0);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn mode_and_sinks_stay_consistent(steps in proptest::collection::vec(step(), 1..60)) {
        let mut h = Harness::new();
        let mut expected = Vec::new();

        for step in &steps {
            if let Some(iso) = apply(&mut h, step) {
                expected.push(iso);
            }
            check(&h)?;
        }

        // Only frames observed while recording were logged, in order.
        prop_assert_eq!(h.telemetry.values(), expected);

        h.command(Command::Shutdown);
        let status = h.status();
        prop_assert!(status.shut_down);
        prop_assert_eq!(status.mode, CaptureMode::Idle);
        prop_assert!(!h.hardware.is_device_open());
        prop_assert!(h.hardware.live_sessions().is_empty());
        prop_assert!(h.telemetry.is_closed());
    }

    #[test]
    fn recording_always_preceded_by_preview(steps in proptest::collection::vec(step(), 1..40)) {
        let mut h = Harness::new();
        let mut previous = h.status().mode;
        for step in &steps {
            apply(&mut h, step);
            let mode = h.status().mode;
            if mode == CaptureMode::Recording && previous != CaptureMode::Recording {
                prop_assert_eq!(previous, CaptureMode::Previewing);
            }
            previous = mode;
        }
    }
}
