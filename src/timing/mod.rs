//! Wall clock used to timestamp telemetry and recording state
//!
//! Telemetry samples carry the wall-clock time at which the frame callback
//! was processed, not the sensor exposure time of the frame.

use chrono::Utc;

/// Source of epoch-millisecond timestamps
pub trait WallClock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// `chrono`-backed system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    #[inline]
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
