use serde::{Deserialize, Serialize};

/// What the engine needs to know about the loaded recording. Decoding and
/// sample buffering happen elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub duration_seconds: f64,
    pub sample_rate: u32,
}

impl AudioInfo {
    pub fn new(duration_seconds: f64, sample_rate: u32) -> Self {
        let duration_seconds = if duration_seconds.is_finite() {
            duration_seconds.max(0.0)
        } else {
            0.0
        };
        Self {
            duration_seconds,
            sample_rate,
        }
    }

    /// Derives the duration from a decoded frame count.
    pub fn from_frame_count(frames: u64, sample_rate: u32) -> Self {
        let duration_seconds = if sample_rate == 0 {
            0.0
        } else {
            frames as f64 / f64::from(sample_rate)
        };
        Self::new(duration_seconds, sample_rate)
    }
}

impl Default for AudioInfo {
    fn default() -> Self {
        Self {
            duration_seconds: 0.0,
            sample_rate: 48_000,
        }
    }
}
