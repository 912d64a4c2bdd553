use crate::timing::PointId;

/// Result alias that carries the crate level [`TimingError`] type.
pub type Result<T> = std::result::Result<T, TimingError>;

/// Outcome of a single store or engine edit.
pub type EditResult<T> = std::result::Result<T, Rejected>;

/// Validation outcome of a rejected edit. The stores are left untouched
/// whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejected {
    #[error("bpm must be finite and positive, got {0}")]
    InvalidBpm(f64),
    #[error("offset must be finite, got {0}")]
    InvalidOffset(f64),
    /// Another timing point already sits at this offset.
    #[error("a timing point already exists at {offset_seconds}s")]
    OffsetCollision { offset_seconds: f64 },
    /// The move would reach or pass a neighbouring timing point.
    #[error("moving {id} to {offset_seconds}s would cross a neighbouring point")]
    CrossesNeighbor { id: PointId, offset_seconds: f64 },
    #[error("unknown timing point {0}")]
    UnknownPoint(PointId),
    #[error("the last remaining timing point cannot be deleted")]
    LastPoint,
    #[error("the time signature at measure 0 cannot be removed or moved")]
    FirstSignature,
    #[error("no time signature at measure {0}")]
    UnknownSignature(i64),
    #[error("a time signature already exists at measure {0}")]
    SignatureCollision(i64),
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum TimingError {
    #[error(transparent)]
    Rejected(#[from] Rejected),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("malformed timing document: {0}")]
    Json(#[from] serde_json::Error),
}

impl TimingError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for TimingError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TimingError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
