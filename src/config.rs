//! Configuration management for isocam
//!
//! Provides configuration loading, saving, and validation for the camera,
//! the recording output, telemetry logging and storage locations.

use crate::errors::CaptureError;
use crate::recording::VideoParams;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsoCamConfig {
    pub camera: CameraConfig,
    pub recording: RecordingOutputConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
}

/// Camera-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Identifier of the device to open
    pub device_id: String,
    /// Frame rate of the repeating request (synthetic backend)
    pub frame_rate: u32,
    /// Simulated open latency in milliseconds (synthetic backend)
    pub open_delay_ms: u64,
    /// Simulated session configure latency in milliseconds (synthetic backend)
    pub configure_delay_ms: u64,
    /// Centre of the simulated ISO reading (synthetic backend)
    pub base_iso: i32,
    /// Maximum deviation of the simulated ISO reading (synthetic backend)
    pub iso_jitter: i32,
}

/// Recording output configuration. Static, never negotiated with the encoder.
///
/// The defaults are the fixed output contract: 1920x1080, 30 fps, 10 Mbit/s.
/// Overrides change the produced file and are meant for tests and hosts
/// that cannot encode full HD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingOutputConfig {
    /// File name of the MP4 output, overwritten every run
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Enable fast-start (moov before mdat)
    pub fast_start: bool,
}

/// Telemetry log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prefix of the per-activation CSV file
    pub file_prefix: String,
    /// chrono format of the activation timestamp in the file name
    pub timestamp_format: String,
}

/// Storage and file management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving the recording and the telemetry logs
    pub output_directory: String,
}

impl Default for IsoCamConfig {
    fn default() -> Self {
        let params = VideoParams::default();
        Self {
            camera: CameraConfig {
                device_id: "0".to_string(),
                frame_rate: 30,
                open_delay_ms: 50,
                configure_delay_ms: 30,
                base_iso: 100,
                iso_jitter: 20,
            },
            recording: RecordingOutputConfig {
                file_name: "recorded_video.mp4".to_string(),
                width: params.width,
                height: params.height,
                fps: params.fps,
                bitrate: params.bitrate,
                fast_start: params.fast_start,
            },
            telemetry: TelemetryConfig {
                file_prefix: "ISO_Log_".to_string(),
                timestamp_format: "%Y%m%d_%H%M%S".to_string(),
            },
            storage: StorageConfig {
                output_directory: "./captures".to_string(),
            },
        }
    }
}

impl IsoCamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {}", e)))?;

        let config: IsoCamConfig = toml::from_str(&contents)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CaptureError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("isocam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Fixed encoder parameters derived from the recording section
    pub fn video_params(&self) -> VideoParams {
        VideoParams::new(self.recording.width, self.recording.height, self.recording.fps)
            .with_bitrate(self.recording.bitrate)
            .with_fast_start(self.recording.fast_start)
    }

    /// Path of the recording output, overwritten every run
    pub fn recording_path(&self) -> PathBuf {
        Path::new(&self.storage.output_directory).join(&self.recording.file_name)
    }

    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(&self.storage.output_directory)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.device_id.trim().is_empty() {
            return Err("Camera device id must not be empty".to_string());
        }
        if self.camera.frame_rate == 0 || self.camera.frame_rate > 240 {
            return Err("Invalid camera frame rate (must be 1-240)".to_string());
        }
        if self.camera.iso_jitter < 0 || self.camera.base_iso <= 0 {
            return Err("Simulated ISO must be positive with non-negative jitter".to_string());
        }

        if self.recording.width == 0 || self.recording.height == 0 {
            return Err("Invalid recording resolution".to_string());
        }
        if !(1.0..=240.0).contains(&self.recording.fps) {
            return Err("Invalid recording FPS (must be 1-240)".to_string());
        }
        if self.recording.bitrate == 0 {
            return Err("Recording bitrate must be positive".to_string());
        }
        if self.recording.file_name.trim().is_empty() {
            return Err("Recording file name must not be empty".to_string());
        }

        if self.telemetry.timestamp_format.trim().is_empty() {
            return Err("Telemetry timestamp format must not be empty".to_string());
        }
        if StrftimeItems::new(&self.telemetry.timestamp_format).any(|item| item == Item::Error) {
            return Err(format!(
                "Invalid telemetry timestamp format: {}",
                self.telemetry.timestamp_format
            ));
        }
        if self.storage.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }

        Ok(())
    }
}
