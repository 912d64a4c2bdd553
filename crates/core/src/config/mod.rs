use serde::{Deserialize, Serialize};

use crate::{Result, TimeSignature};

/// Tunables of the timing engine. Missing fields fall back to the defaults so
/// partial JSON files stay valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tempo of the single point left behind by a clear.
    pub default_bpm: f64,
    pub default_signature: TimeSignature,
    /// Two offsets closer than this are the same offset.
    pub offset_epsilon_seconds: f64,
    pub history_limit: usize,
    pub double_activation_window_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_bpm: 120.0,
            default_signature: TimeSignature::COMMON,
            offset_epsilon_seconds: 1e-6,
            history_limit: 512,
            double_activation_window_ms: 300,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Replaces values the engine cannot work with by their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.default_bpm.is_finite() && self.default_bpm > 0.0) {
            self.default_bpm = defaults.default_bpm;
        }
        if !(self.offset_epsilon_seconds.is_finite() && self.offset_epsilon_seconds >= 0.0) {
            self.offset_epsilon_seconds = defaults.offset_epsilon_seconds;
        }
        self.default_signature = self.default_signature.corrected();
        self.history_limit = self.history_limit.max(1);
        self
    }
}
