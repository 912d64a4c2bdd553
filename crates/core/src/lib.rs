//! Core library of the beat-mapping timing engine.
//!
//! The engine keeps two breakpoint collections that index the same timeline
//! in different coordinates: tempo points anchored in playback time and meter
//! points anchored in measures. [`TimingEngine`] owns both, converts between
//! time and musical position, classifies grid lines and journals every edit
//! for undo/redo. Audio decoding, rendering and file formats stay outside and
//! talk to the engine through plain value types.

pub mod audio;
pub mod config;
pub mod convert;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod grid;
pub mod history;
pub mod signature;
pub mod timing;

pub use audio::AudioInfo;
pub use config::EngineConfig;
pub use convert::{measure_of, CoordinateConverter, ExpandedPoint};
pub use document::{SignatureRecord, TimingDocument, TimingRecord};
pub use engine::{TimingEngine, TimingSnapshot};
pub use error::{EditResult, Rejected, Result, TimingError};
pub use events::{TimingEvent, TimingObserver};
pub use grid::{classify, is_aligned_to, relative_position, GridLine, GridTier};
pub use history::{EditHistory, EditKind};
pub use signature::{
    correct_time_signature, TimeSignature, TimeSignaturePoint, TimeSignatureStore,
    ALLOWED_DENOMINATORS,
};
pub use timing::{PointId, TimingPoint, TimingPointStore};
