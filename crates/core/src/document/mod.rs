//! In-memory shape of a persisted timing setup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub offset_seconds: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub measure_index: i64,
    pub numerator: u32,
    pub denominator: u32,
}

/// Ordered breakpoint lists as handed to and from persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingDocument {
    #[serde(default)]
    pub timing_points: Vec<TimingRecord>,
    #[serde(default)]
    pub time_signatures: Vec<SignatureRecord>,
}

impl TimingDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimingError;

    #[test]
    fn missing_lists_default_to_empty() {
        let doc = TimingDocument::from_json_str(
            r#"{ "timing_points": [ { "offset_seconds": 0.25, "bpm": 170.0 } ] }"#,
        )
        .unwrap();
        assert_eq!(doc.timing_points.len(), 1);
        assert!(doc.time_signatures.is_empty());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = TimingDocument::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, TimingError::Json(_)));
    }

    #[test]
    fn saves_and_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timing.json");
        let doc = TimingDocument {
            timing_points: vec![TimingRecord {
                offset_seconds: 1.5,
                bpm: 128.0,
            }],
            time_signatures: vec![SignatureRecord {
                measure_index: 0,
                numerator: 7,
                denominator: 8,
            }],
        };

        doc.save(&path).unwrap();
        assert_eq!(TimingDocument::load(&path).unwrap(), doc);
    }
}
