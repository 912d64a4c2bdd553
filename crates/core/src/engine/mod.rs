//! The timing engine owns both breakpoint stores and the edit journal.
//!
//! Every mutation validates first and only then touches the stores, so a
//! rejected call changes nothing. A successful one recomputes cached
//! positions, records a snapshot and notifies observers before returning.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    convert::measure_of, grid, timing::now_ms, AudioInfo, CoordinateConverter, EditHistory,
    EditKind, EditResult, EngineConfig, ExpandedPoint, GridLine, PointId, Rejected, Result,
    SignatureRecord, TimeSignature, TimeSignatureStore, TimingDocument, TimingError, TimingEvent,
    TimingObserver, TimingPointStore, TimingRecord,
};

/// Immutable copy of both stores, as kept by the edit journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSnapshot {
    points: TimingPointStore,
    signatures: TimeSignatureStore,
}

impl TimingSnapshot {
    pub fn points(&self) -> &TimingPointStore {
        &self.points
    }

    pub fn signatures(&self) -> &TimeSignatureStore {
        &self.signatures
    }
}

pub struct TimingEngine {
    config: EngineConfig,
    points: TimingPointStore,
    signatures: TimeSignatureStore,
    history: EditHistory<TimingSnapshot>,
    audio: Option<AudioInfo>,
    observers: Vec<Box<dyn TimingObserver>>,
}

impl TimingEngine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let points = TimingPointStore::new(config.default_bpm, config.offset_epsilon_seconds);
        let signatures = TimeSignatureStore::new(config.default_signature);
        let history = EditHistory::new(
            TimingSnapshot {
                points: points.clone(),
                signatures: signatures.clone(),
            },
            config.history_limit,
        );
        Self {
            config,
            points,
            signatures,
            history,
            audio: None,
            observers: Vec::new(),
        }
    }

    /// Builds an engine from persisted breakpoints. The journal starts at the
    /// loaded state.
    pub fn from_document(document: &TimingDocument, config: EngineConfig) -> Result<Self> {
        let mut engine = Self::new(config);
        engine.load_document(document)?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn points(&self) -> &TimingPointStore {
        &self.points
    }

    pub fn signatures(&self) -> &TimeSignatureStore {
        &self.signatures
    }

    pub fn converter(&self) -> CoordinateConverter<'_> {
        CoordinateConverter::new(&self.points, &self.signatures)
    }

    pub fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            points: self.points.clone(),
            signatures: self.signatures.clone(),
        }
    }

    pub fn subscribe(&mut self, observer: impl TimingObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn audio(&self) -> Option<AudioInfo> {
        self.audio
    }

    pub fn set_audio(&mut self, audio: AudioInfo) {
        debug!(
            duration_seconds = audio.duration_seconds,
            sample_rate = audio.sample_rate,
            "audio attached"
        );
        self.audio = Some(audio);
        self.notify(TimingEvent::AudioChanged(audio));
    }

    pub fn insert_timing_point(&mut self, offset_seconds: f64, bpm: f64) -> EditResult<PointId> {
        let id = self
            .points
            .insert(offset_seconds, bpm, &self.signatures)
            .map_err(|err| rejected("insert timing point", err))?;
        debug!(%id, offset_seconds, bpm, "timing point inserted");
        self.commit(EditKind::InsertPoint, TimingEvent::PointInserted(id));
        Ok(id)
    }

    pub fn move_timing_point(&mut self, id: PointId, offset_seconds: f64) -> EditResult<()> {
        self.points
            .move_point(id, offset_seconds, &self.signatures)
            .map_err(|err| rejected("move timing point", err))?;
        debug!(%id, offset_seconds, "timing point moved");
        self.commit(EditKind::MovePoint, TimingEvent::PointMoved(id));
        Ok(())
    }

    pub fn set_bpm(&mut self, id: PointId, bpm: f64) -> EditResult<()> {
        self.points
            .set_bpm(id, bpm, &self.signatures)
            .map_err(|err| rejected("set bpm", err))?;
        debug!(%id, bpm, "bpm changed");
        self.commit(EditKind::SetBpm, TimingEvent::BpmChanged(id));
        Ok(())
    }

    pub fn delete_timing_point(&mut self, id: PointId) -> EditResult<()> {
        self.points
            .delete(id, &self.signatures)
            .map_err(|err| rejected("delete timing point", err))?;
        debug!(%id, "timing point deleted");
        self.commit(EditKind::DeletePoint, TimingEvent::PointDeleted(id));
        Ok(())
    }

    /// Resets both stores to a single default tempo point and meter.
    pub fn clear_all(&mut self) {
        self.points.clear(self.config.default_bpm);
        self.signatures.clear(self.config.default_signature);
        self.points.recompute_positions(&self.signatures);
        debug!("timing cleared");
        self.commit(EditKind::ClearAll, TimingEvent::Cleared);
    }

    /// True when `id` was created within the double-activation window, i.e. a
    /// second click on it is most likely part of the gesture that placed it.
    pub fn is_double_activation(&self, id: PointId) -> bool {
        self.points
            .created_within(id, now_ms(), self.config.double_activation_window_ms)
    }

    /// Sets the meter at `measure_index` and returns the corrected signature
    /// actually stored.
    pub fn update_time_signature(
        &mut self,
        measure_index: i64,
        numerator: i64,
        denominator: i64,
    ) -> TimeSignature {
        let measure_index = measure_index.max(0);
        let corrected = crate::correct_time_signature(numerator, denominator);
        let unchanged = self
            .signatures
            .get(measure_index)
            .map(|existing| existing.signature() == corrected)
            .unwrap_or(false);
        if unchanged {
            return corrected;
        }

        let signature = self.signatures.update(measure_index, numerator, denominator);
        self.points.recompute_positions(&self.signatures);
        debug!(measure_index, %signature, "time signature updated");
        self.commit(
            EditKind::UpdateSignature,
            TimingEvent::SignatureChanged {
                measure_index,
                signature,
            },
        );
        signature
    }

    pub fn remove_time_signature(&mut self, measure_index: i64) -> EditResult<()> {
        self.signatures
            .remove(measure_index)
            .map_err(|err| rejected("remove time signature", err))?;
        self.points.recompute_positions(&self.signatures);
        debug!(measure_index, "time signature removed");
        self.commit(
            EditKind::RemoveSignature,
            TimingEvent::SignatureRemoved(measure_index),
        );
        Ok(())
    }

    pub fn move_time_signature(&mut self, from: i64, to: i64) -> EditResult<()> {
        if from == to {
            return self
                .signatures
                .move_to(from, to)
                .map_err(|err| rejected("move time signature", err));
        }
        self.signatures
            .move_to(from, to)
            .map_err(|err| rejected("move time signature", err))?;
        self.points.recompute_positions(&self.signatures);
        debug!(from, to, "time signature moved");
        self.commit(EditKind::MoveSignature, TimingEvent::SignatureMoved { from, to });
        Ok(())
    }

    /// Reverts the latest edit. Returns what was undone, or `None` at the
    /// start of the journal.
    pub fn undo(&mut self) -> Option<EditKind> {
        let kind = self.history.undo_label()?;
        let snapshot = self.history.undo()?;
        trace!(cursor = self.history.cursor(), %kind, "undo");
        self.restore(snapshot);
        self.notify(TimingEvent::Undone(kind));
        Some(kind)
    }

    pub fn redo(&mut self) -> Option<EditKind> {
        let kind = self.history.redo_label()?;
        let snapshot = self.history.redo()?;
        trace!(cursor = self.history.cursor(), %kind, "redo");
        self.restore(snapshot);
        self.notify(TimingEvent::Redone(kind));
        Some(kind)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<EditKind> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<EditKind> {
        self.history.redo_label()
    }

    /// Replaces both stores with the document's breakpoints. Nothing changes
    /// if any record is rejected.
    pub fn load_document(&mut self, document: &TimingDocument) -> Result<()> {
        let mut signatures = TimeSignatureStore::new(self.config.default_signature);
        for record in &document.time_signatures {
            signatures.update(
                record.measure_index,
                i64::from(record.numerator),
                i64::from(record.denominator),
            );
        }
        let points = TimingPointStore::from_records(
            document
                .timing_points
                .iter()
                .map(|record| (record.offset_seconds, record.bpm)),
            &signatures,
            self.config.default_bpm,
            self.config.offset_epsilon_seconds,
        )
        .map_err(|err| {
            warn!(error = %err, "timing document rejected");
            TimingError::from(err)
        })?;

        let mut points = points;
        points.reissue_ids_after(&self.points);
        self.points = points;
        self.signatures = signatures;
        self.history.reset(self.snapshot());
        debug!(
            timing_points = self.points.len(),
            time_signatures = self.signatures.len(),
            "timing document loaded"
        );
        self.notify(TimingEvent::Loaded);
        Ok(())
    }

    pub fn to_document(&self) -> TimingDocument {
        TimingDocument {
            timing_points: self
                .points
                .points()
                .iter()
                .map(|p| TimingRecord {
                    offset_seconds: p.offset_seconds(),
                    bpm: p.bpm(),
                })
                .collect(),
            time_signatures: self
                .signatures
                .points()
                .iter()
                .map(|p| SignatureRecord {
                    measure_index: p.measure_index(),
                    numerator: p.signature().numerator,
                    denominator: p.signature().denominator,
                })
                .collect(),
        }
    }

    pub fn time_to_musical_position(&self, time_seconds: f64) -> f64 {
        self.converter().time_to_musical_position(time_seconds)
    }

    pub fn musical_position_to_time(&self, musical_position: f64) -> f64 {
        self.converter().musical_position_to_time(musical_position)
    }

    /// Last measure reached by the attached audio, 0 without audio.
    pub fn last_measure(&self) -> i64 {
        let duration = self.audio.map(|a| a.duration_seconds).unwrap_or(0.0);
        self.converter().last_measure(duration)
    }

    pub fn expand_with_boundary_points(&self) -> Vec<ExpandedPoint> {
        self.converter().expand_with_boundary_points()
    }

    pub fn signature_at(&self, measure_index: i64) -> TimeSignature {
        self.signatures.signature_at(measure_index)
    }

    pub fn signature_at_time(&self, time_seconds: f64) -> TimeSignature {
        self.signature_at(measure_of(self.time_to_musical_position(time_seconds)))
    }

    pub fn bpm_at(&self, time_seconds: f64) -> f64 {
        self.points.point_at_or_before_time(time_seconds).bpm()
    }

    /// Beat reached inside the current measure, e.g. 2.5 halfway through the
    /// third beat.
    pub fn beat_position(&self, time_seconds: f64) -> f64 {
        let position = self.time_to_musical_position(time_seconds);
        let measure = measure_of(position);
        let fraction = (position - measure as f64).max(0.0);
        fraction * f64::from(self.signature_at(measure).numerator)
    }

    /// Rounds `time_seconds` to the nearest line of a grid with `divisor`
    /// lines per beat.
    pub fn snap_time(&self, time_seconds: f64, divisor: u32) -> f64 {
        let position = self.time_to_musical_position(time_seconds);
        let measure = measure_of(position);
        let total = f64::from(grid::subdivisions_per_measure(
            self.signature_at(measure),
            divisor,
        ));
        let index = ((position - measure as f64) * total).round();
        self.musical_position_to_time(measure as f64 + index / total)
    }

    /// Grid lines between two times, inclusive, classified for rendering.
    pub fn grid_lines(&self, start_seconds: f64, end_seconds: f64, divisor: u32) -> Vec<GridLine> {
        let divisor = divisor.max(1);
        let start = self.time_to_musical_position(start_seconds);
        let end = self.time_to_musical_position(end_seconds);
        let mut lines = Vec::new();
        if !start.is_finite() || !end.is_finite() || end < start {
            return lines;
        }

        for measure in start.floor() as i64..=measure_of(end) {
            let signature = self.signature_at(measure);
            for index in 0..grid::subdivisions_per_measure(signature, divisor) {
                let position = measure as f64 + grid::relative_position(signature, divisor, index);
                if position < start - 1e-9 || position > end + 1e-9 {
                    continue;
                }
                lines.push(GridLine {
                    time_seconds: self.musical_position_to_time(position),
                    musical_position: position,
                    measure,
                    index,
                    tier: grid::classify(signature, divisor, index),
                });
            }
        }
        lines
    }

    fn commit(&mut self, kind: EditKind, event: TimingEvent) {
        debug_assert!(self.points.is_consistent());
        debug_assert!(self.signatures.is_consistent());
        let snapshot = self.snapshot();
        self.history.record(kind, snapshot);
        self.notify(event);
    }

    fn restore(&mut self, snapshot: TimingSnapshot) {
        let mut points = snapshot.points;
        points.reserve_ids_of(&self.points);
        self.points = points;
        self.signatures = snapshot.signatures;
    }

    fn notify(&mut self, event: TimingEvent) {
        for observer in &mut self.observers {
            observer.timing_changed(&event);
        }
    }
}

impl Default for TimingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for TimingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingEngine")
            .field("config", &self.config)
            .field("points", &self.points.len())
            .field("signatures", &self.signatures.len())
            .field("history", &self.history.len())
            .field("audio", &self.audio)
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn rejected(operation: &'static str, err: Rejected) -> Rejected {
    warn!(operation, reason = %err, "edit rejected");
    err
}
