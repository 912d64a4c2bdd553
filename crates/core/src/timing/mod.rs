//! Tempo breakpoints keyed by playback time.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{convert, Rejected, TimeSignatureStore};

/// Stable handle to a timing point. Survives moves and reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub u64);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tempo breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    id: PointId,
    offset_seconds: f64,
    bpm: f64,
    /// Measure coordinate of `offset_seconds`, derived from every earlier
    /// point and the meter breakpoints.
    musical_position: f64,
    created_at_ms: u64,
}

impl TimingPoint {
    pub fn id(&self) -> PointId {
        self.id
    }

    pub fn offset_seconds(&self) -> f64 {
        self.offset_seconds
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn musical_position(&self) -> f64 {
        self.musical_position
    }

    /// Wall-clock creation time in Unix milliseconds.
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }
}

/// Ordered tempo breakpoints. Offsets are strictly increasing and the store
/// never runs empty; the first point is anchored at musical position 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingPointStore {
    points: Vec<TimingPoint>,
    next_id: u64,
    epsilon: f64,
}

impl TimingPointStore {
    /// Creates a store holding a single point at offset 0.
    pub fn new(default_bpm: f64, epsilon: f64) -> Self {
        let mut store = Self {
            points: Vec::new(),
            next_id: 1,
            epsilon,
        };
        store.push_default(default_bpm);
        store
    }

    /// Rebuilds a store from persisted `(offset_seconds, bpm)` records. An
    /// empty record list yields the single default point.
    pub fn from_records(
        records: impl IntoIterator<Item = (f64, f64)>,
        signatures: &TimeSignatureStore,
        default_bpm: f64,
        epsilon: f64,
    ) -> Result<Self, Rejected> {
        let mut store = Self {
            points: Vec::new(),
            next_id: 1,
            epsilon,
        };
        for (offset_seconds, bpm) in records {
            store.insert(offset_seconds, bpm, signatures)?;
        }
        if store.points.is_empty() {
            store.push_default(default_bpm);
        }
        Ok(store)
    }

    pub fn points(&self) -> &[TimingPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn first(&self) -> &TimingPoint {
        &self.points[0]
    }

    pub fn get(&self, id: PointId) -> Option<&TimingPoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn index_of(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    pub fn insert(
        &mut self,
        offset_seconds: f64,
        bpm: f64,
        signatures: &TimeSignatureStore,
    ) -> Result<PointId, Rejected> {
        validate_offset(offset_seconds)?;
        validate_bpm(bpm)?;

        let index = self.points.partition_point(|p| p.offset_seconds < offset_seconds);
        let collides = |neighbor: Option<&TimingPoint>| {
            neighbor
                .map(|p| (p.offset_seconds - offset_seconds).abs() <= self.epsilon)
                .unwrap_or(false)
        };
        let previous = index.checked_sub(1).and_then(|i| self.points.get(i));
        if collides(self.points.get(index)) || collides(previous) {
            return Err(Rejected::OffsetCollision { offset_seconds });
        }

        let id = self.allocate_id();
        self.points.insert(
            index,
            TimingPoint {
                id,
                offset_seconds,
                bpm,
                musical_position: 0.0,
                created_at_ms: now_ms(),
            },
        );
        self.recompute_from(index, signatures);
        Ok(id)
    }

    /// Shifts a point in time. The point may not reach its neighbours.
    pub fn move_point(
        &mut self,
        id: PointId,
        offset_seconds: f64,
        signatures: &TimeSignatureStore,
    ) -> Result<(), Rejected> {
        let index = self.index_of(id).ok_or(Rejected::UnknownPoint(id))?;
        validate_offset(offset_seconds)?;

        let crosses_previous = index > 0
            && offset_seconds <= self.points[index - 1].offset_seconds + self.epsilon;
        let crosses_next = self
            .points
            .get(index + 1)
            .map(|next| offset_seconds >= next.offset_seconds - self.epsilon)
            .unwrap_or(false);
        if crosses_previous || crosses_next {
            return Err(Rejected::CrossesNeighbor { id, offset_seconds });
        }

        self.points[index].offset_seconds = offset_seconds;
        self.recompute_from(index, signatures);
        Ok(())
    }

    pub fn set_bpm(
        &mut self,
        id: PointId,
        bpm: f64,
        signatures: &TimeSignatureStore,
    ) -> Result<(), Rejected> {
        let index = self.index_of(id).ok_or(Rejected::UnknownPoint(id))?;
        validate_bpm(bpm)?;

        self.points[index].bpm = bpm;
        self.recompute_from(index, signatures);
        Ok(())
    }

    /// Removes a point. When the first point goes, its successor becomes the
    /// new anchor at musical position 0.
    pub fn delete(
        &mut self,
        id: PointId,
        signatures: &TimeSignatureStore,
    ) -> Result<TimingPoint, Rejected> {
        let index = self.index_of(id).ok_or(Rejected::UnknownPoint(id))?;
        if self.points.len() == 1 {
            return Err(Rejected::LastPoint);
        }

        let removed = self.points.remove(index);
        self.recompute_from(index, signatures);
        Ok(removed)
    }

    pub fn clear(&mut self, default_bpm: f64) {
        self.points.clear();
        self.push_default(default_bpm);
    }

    /// Index of the point governing `time_seconds`. Times before the first
    /// point resolve to the first point.
    pub fn index_at_or_before_time(&self, time_seconds: f64) -> usize {
        self.points
            .partition_point(|p| p.offset_seconds <= time_seconds)
            .saturating_sub(1)
    }

    pub fn index_at_or_before_position(&self, musical_position: f64) -> usize {
        self.points
            .partition_point(|p| p.musical_position <= musical_position)
            .saturating_sub(1)
    }

    pub fn point_at_or_before_time(&self, time_seconds: f64) -> &TimingPoint {
        &self.points[self.index_at_or_before_time(time_seconds)]
    }

    pub fn point_at_or_before_position(&self, musical_position: f64) -> &TimingPoint {
        &self.points[self.index_at_or_before_position(musical_position)]
    }

    /// True when the point was created less than `window_ms` before `now_ms`.
    /// Editors use it to tell a double activation from a deliberate delete.
    pub fn created_within(&self, id: PointId, now_ms: u64, window_ms: u64) -> bool {
        self.get(id)
            .map(|p| now_ms.saturating_sub(p.created_at_ms) < window_ms)
            .unwrap_or(false)
    }

    /// Recomputes every cached position. Required after any meter edit.
    pub(crate) fn recompute_positions(&mut self, signatures: &TimeSignatureStore) {
        self.recompute_from(0, signatures);
    }

    pub fn is_consistent(&self) -> bool {
        let Some(first) = self.points.first() else {
            return false;
        };
        first.musical_position == 0.0
            && self
                .points
                .iter()
                .all(|p| p.offset_seconds.is_finite() && p.bpm.is_finite() && p.bpm > 0.0)
            && self.points.windows(2).all(|pair| {
                pair[0].offset_seconds < pair[1].offset_seconds
                    && pair[0].musical_position < pair[1].musical_position
            })
    }

    fn recompute_from(&mut self, start: usize, signatures: &TimeSignatureStore) {
        for index in start..self.points.len() {
            let position = match index.checked_sub(1) {
                None => 0.0,
                Some(previous) => {
                    let previous = &self.points[previous];
                    convert::advance_to_time(
                        signatures,
                        previous.offset_seconds,
                        previous.musical_position,
                        previous.beat_duration_seconds(),
                        self.points[index].offset_seconds,
                    )
                }
            };
            self.points[index].musical_position = position;
        }
        debug_assert!(self.is_consistent());
    }

    fn push_default(&mut self, bpm: f64) {
        let id = self.allocate_id();
        self.points.push(TimingPoint {
            id,
            offset_seconds: 0.0,
            bpm,
            musical_position: 0.0,
            created_at_ms: now_ms(),
        });
    }

    /// Advances the id allocator past every id `other` has handed out, so
    /// ids freed by an undo are never issued again.
    pub(crate) fn reserve_ids_of(&mut self, other: &TimingPointStore) {
        self.next_id = self.next_id.max(other.next_id);
    }

    /// Gives every point a fresh id allocated after those of `previous`.
    pub(crate) fn reissue_ids_after(&mut self, previous: &TimingPointStore) {
        self.next_id = previous.next_id;
        for index in 0..self.points.len() {
            let id = self.allocate_id();
            self.points[index].id = id;
        }
    }

    fn allocate_id(&mut self) -> PointId {
        let id = PointId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Stores compare by their breakpoints; the id allocator is not part of the
/// timeline.
impl PartialEq for TimingPointStore {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points && self.epsilon == other.epsilon
    }
}

impl Default for TimingPointStore {
    fn default() -> Self {
        Self::new(120.0, 1e-6)
    }
}

fn validate_bpm(bpm: f64) -> Result<(), Rejected> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(Rejected::InvalidBpm(bpm))
    }
}

fn validate_offset(offset_seconds: f64) -> Result<(), Rejected> {
    if offset_seconds.is_finite() {
        Ok(())
    } else {
        Err(Rejected::InvalidOffset(offset_seconds))
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(store: &TimingPointStore) -> Vec<f64> {
        store.points().iter().map(|p| p.offset_seconds()).collect()
    }

    #[test]
    fn inserts_in_time_order() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        store.insert(4.0, 90.0, &signatures).unwrap();
        store.insert(2.0, 150.0, &signatures).unwrap();

        assert_eq!(offsets(&store), vec![0.0, 2.0, 4.0]);
        // 2s of 4/4 at 120 bpm is exactly one measure.
        assert!((store.points()[1].musical_position() - 1.0).abs() < 1e-12);
        // 2s at 150 bpm is 5 beats, i.e. 1.25 measures.
        assert!((store.points()[2].musical_position() - 2.25).abs() < 1e-12);
    }

    #[test]
    fn rejects_collisions_and_bad_tempo() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        store.insert(1.0, 100.0, &signatures).unwrap();

        assert_eq!(
            store.insert(1.0 + 1e-9, 100.0, &signatures),
            Err(Rejected::OffsetCollision {
                offset_seconds: 1.0 + 1e-9
            })
        );
        assert_eq!(store.insert(3.0, 0.0, &signatures), Err(Rejected::InvalidBpm(0.0)));
        assert!(matches!(
            store.insert(f64::NAN, 100.0, &signatures),
            Err(Rejected::InvalidOffset(_))
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn move_cannot_cross_neighbours() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        let a = store.insert(1.0, 100.0, &signatures).unwrap();
        store.insert(2.0, 100.0, &signatures).unwrap();

        let before = store.clone();
        assert!(matches!(
            store.move_point(a, 2.0, &signatures),
            Err(Rejected::CrossesNeighbor { .. })
        ));
        assert!(matches!(
            store.move_point(a, 0.0, &signatures),
            Err(Rejected::CrossesNeighbor { .. })
        ));
        assert_eq!(store, before);

        store.move_point(a, 1.5, &signatures).unwrap();
        assert_eq!(offsets(&store), vec![0.0, 1.5, 2.0]);
    }

    #[test]
    fn first_point_may_move_backwards_freely() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        let first = store.first().id();
        store.move_point(first, -0.75, &signatures).unwrap();
        assert_eq!(store.first().offset_seconds(), -0.75);
        assert_eq!(store.first().musical_position(), 0.0);
    }

    #[test]
    fn deleting_the_first_point_reanchors_its_successor() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        let first = store.first().id();
        let second = store.insert(3.0, 100.0, &signatures).unwrap();

        store.delete(first, &signatures).unwrap();
        assert_eq!(store.first().id(), second);
        assert_eq!(store.first().musical_position(), 0.0);
        assert_eq!(store.delete(second, &signatures), Err(Rejected::LastPoint));
    }

    #[test]
    fn set_bpm_shifts_later_positions() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        let first = store.first().id();
        store.insert(4.0, 120.0, &signatures).unwrap();
        assert!((store.points()[1].musical_position() - 2.0).abs() < 1e-12);

        store.set_bpm(first, 60.0, &signatures).unwrap();
        assert!((store.points()[1].musical_position() - 1.0).abs() < 1e-12);
        assert_eq!(
            store.set_bpm(first, f64::INFINITY, &signatures),
            Err(Rejected::InvalidBpm(f64::INFINITY))
        );
    }

    #[test]
    fn handles_survive_reordering_and_unknown_ids_are_rejected() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        let late = store.insert(5.0, 100.0, &signatures).unwrap();
        store.insert(2.0, 100.0, &signatures).unwrap();

        assert_eq!(store.index_of(late), Some(2));
        assert_eq!(
            store.set_bpm(PointId(999), 100.0, &signatures),
            Err(Rejected::UnknownPoint(PointId(999)))
        );
    }

    #[test]
    fn lookups_resolve_governing_point() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        let second = store.insert(2.0, 60.0, &signatures).unwrap();

        assert_eq!(store.point_at_or_before_time(-5.0).offset_seconds(), 0.0);
        assert_eq!(store.point_at_or_before_time(1.999).offset_seconds(), 0.0);
        assert_eq!(store.point_at_or_before_time(2.0).id(), second);
        assert_eq!(store.point_at_or_before_position(1.0).id(), second);
        assert_eq!(store.point_at_or_before_position(0.5).offset_seconds(), 0.0);
    }

    #[test]
    fn creation_window_query() {
        let signatures = TimeSignatureStore::default();
        let mut store = TimingPointStore::default();
        let id = store.insert(1.0, 100.0, &signatures).unwrap();
        let created = store.get(id).unwrap().created_at_ms();

        assert!(store.created_within(id, created + 100, 300));
        assert!(!store.created_within(id, created + 300, 300));
        assert!(!store.created_within(PointId(42), created, 300));
    }

    #[test]
    fn restores_from_records() {
        let signatures = TimeSignatureStore::default();
        let store =
            TimingPointStore::from_records([(2.0, 90.0), (0.5, 120.0)], &signatures, 120.0, 1e-6)
                .unwrap();
        assert_eq!(offsets(&store), vec![0.5, 2.0]);

        let empty = TimingPointStore::from_records(Vec::new(), &signatures, 140.0, 1e-6).unwrap();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty.first().bpm(), 140.0);
    }
}
