use isocam::IsoCamConfig;
use std::path::PathBuf;

#[test]
fn test_partial_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("isocam.toml");
    std::fs::write(&path, "[camera]\ndevice_id = \"1\"\n").unwrap();

    let err = IsoCamConfig::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_round_trip_keeps_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("isocam.toml");

    let mut config = IsoCamConfig::default();
    config.camera.device_id = "front".to_string();
    config.recording.width = 640;
    config.recording.height = 480;
    config.storage.output_directory = dir.path().display().to_string();
    config.save_to_file(&path).unwrap();

    let loaded = IsoCamConfig::load_from_file(&path).unwrap();
    assert!(loaded.validate().is_ok());
    assert_eq!(loaded.camera.device_id, "front");
    assert_eq!(loaded.video_params().width, 640);
    assert_eq!(loaded.video_params().bitrate, 10_000_000);
    assert_eq!(loaded.recording_path(), dir.path().join("recorded_video.mp4"));
}

#[test]
fn test_defaults_match_fixed_recording_parameters() {
    let config = IsoCamConfig::default();
    let params = config.video_params();
    assert_eq!((params.width, params.height), (1920, 1080));
    assert_eq!(params.fps, 30.0);
    assert_eq!(params.bitrate, 10_000_000);
    assert_eq!(config.telemetry.file_prefix, "ISO_Log_");
    assert_eq!(IsoCamConfig::default_path(), PathBuf::from("isocam.toml"));
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = IsoCamConfig::default();
    config.camera.device_id = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = IsoCamConfig::default();
    config.recording.bitrate = 0;
    assert!(config.validate().is_err());

    let mut config = IsoCamConfig::default();
    config.recording.fps = 0.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_rejects_unknown_timestamp_specifier() {
    let mut config = IsoCamConfig::default();
    config.telemetry.timestamp_format = "%Y%Q".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.contains("timestamp format"));

    config.telemetry.timestamp_format = "%Y-%m-%d_%H%M%S".to_string();
    assert!(config.validate().is_ok());
}
