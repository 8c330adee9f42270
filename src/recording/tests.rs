//! Tests for the recording module

#[cfg(test)]
mod recording_tests {
    use crate::recording::{OutputFormat, RecordingStats, VideoCodec, VideoParams};

    #[test]
    fn test_fixed_parameters() {
        let params = VideoParams::default();
        assert_eq!((params.width, params.height), (1920, 1080));
        assert_eq!(params.fps, 30.0);
        assert_eq!(params.bitrate, 10_000_000);
        assert_eq!(params.format, OutputFormat::Mpeg4);
        assert_eq!(params.codec, VideoCodec::H264);
    }

    #[test]
    fn test_builder_overrides() {
        let params = VideoParams::new(320, 240, 15.0)
            .with_bitrate(1_000_000)
            .with_fast_start(false)
            .with_title("bench");
        assert_eq!(params.bitrate, 1_000_000);
        assert!(!params.fast_start);
        assert_eq!(params.title.as_deref(), Some("bench"));
        assert_eq!(params.rgb_frame_len(), 320 * 240 * 3);
    }

    #[test]
    fn test_avg_bitrate() {
        let stats = RecordingStats {
            video_frames: 30,
            duration_secs: 2.0,
            bytes_written: 250_000,
            ..RecordingStats::default()
        };
        assert_eq!(stats.avg_bitrate(), 1_000_000.0);
        assert_eq!(RecordingStats::default().avg_bitrate(), 0.0);
    }
}

#[cfg(all(test, feature = "recording"))]
mod mp4_sink_tests {
    use crate::errors::CaptureError;
    use crate::platform::FrameConsumer;
    use crate::recording::{Mp4RecordingSink, RecordingSink, SinkState, VideoParams};
    use crate::testing::synthetic_video_frame;
    use std::time::Duration;

    #[test]
    fn test_lifecycle_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("recorded_video.mp4");
        let params = VideoParams::new(320, 240, 30.0);
        let mut sink = Mp4RecordingSink::new();

        let surface = sink.prepare(&output, &params).unwrap();
        assert_eq!(sink.state(), SinkState::Prepared);

        // Not active yet: frames are ignored.
        surface.consume(&synthetic_video_frame(0, 320, 240));

        sink.start().unwrap();
        for n in 0..5 {
            surface.consume(&synthetic_video_frame(n, 320, 240).with_frame_number(n));
            std::thread::sleep(Duration::from_millis(40));
        }

        let stats = sink.stop().unwrap();
        assert_eq!(sink.state(), SinkState::Stopped);
        assert_eq!(stats.video_frames + stats.dropped_frames, 5);
        assert!(stats.video_frames > 0);
        assert!(std::fs::metadata(&output).unwrap().len() > 0);

        sink.reset();
        assert_eq!(sink.state(), SinkState::Unconfigured);
        assert_eq!(sink.write_errors(), 0);
    }

    #[test]
    fn test_stop_without_start_is_sink_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Mp4RecordingSink::new();
        assert!(matches!(sink.stop(), Err(CaptureError::SinkStop(_))));

        sink.prepare(&dir.path().join("a.mp4"), &VideoParams::new(64, 48, 30.0))
            .unwrap();
        assert!(matches!(sink.stop(), Err(CaptureError::SinkStop(_))));
        sink.reset();
        assert_eq!(sink.state(), SinkState::Unconfigured);
    }

    #[test]
    fn test_prepare_twice_requires_reset() {
        let dir = tempfile::tempdir().unwrap();
        let params = VideoParams::new(64, 48, 30.0);
        let mut sink = Mp4RecordingSink::new();
        sink.prepare(&dir.path().join("a.mp4"), &params).unwrap();
        assert!(matches!(
            sink.prepare(&dir.path().join("b.mp4"), &params),
            Err(CaptureError::Prepare(_))
        ));
        sink.reset();
        assert!(sink.prepare(&dir.path().join("b.mp4"), &params).is_ok());
    }

    #[test]
    fn test_unwritable_output_is_prepare_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let mut sink = Mp4RecordingSink::new();
        let result = sink.prepare(&blocker.join("out.mp4"), &VideoParams::new(64, 48, 30.0));
        assert!(matches!(result, Err(CaptureError::Prepare(_))));
        assert_eq!(sink.state(), SinkState::Unconfigured);
    }

    #[test]
    fn test_start_requires_prepare() {
        let mut sink = Mp4RecordingSink::new();
        assert!(matches!(sink.start(), Err(CaptureError::SinkStart(_))));
    }
}
