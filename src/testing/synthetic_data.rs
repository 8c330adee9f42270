//! Generated frame content and sensor readings
//!
//! Lets the synthetic backend and the test suite exercise the encoder and
//! the telemetry path without hardware.

use crate::types::VideoFrame;

/// RGB24 gradient frame whose content shifts every frame, so the encoder
/// sees temporal change.
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> VideoFrame {
    let mut data = vec![0u8; (width as usize) * (height as usize) * 3];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y as usize) * (width as usize) + x as usize) * 3;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    VideoFrame::new(data, width, height, "synthetic".to_string())
}

/// Deterministic ISO reading that drifts around `base` by at most `jitter`.
/// Never below 1.
pub fn synthetic_iso(frame_number: u64, base: i32, jitter: i32) -> i32 {
    let jitter = jitter.max(0);
    if jitter == 0 {
        return base.max(1);
    }
    // Triangle wave, period 4 * jitter frames.
    let period = (jitter as u64) * 4;
    let phase = (frame_number % period) as i32;
    let offset = if phase <= 2 * jitter {
        phase - jitter
    } else {
        3 * jitter - phase
    };
    base.saturating_add(offset).max(1)
}
