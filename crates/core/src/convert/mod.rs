//! Conversion between playback time and musical position.
//!
//! Tempo breakpoints live in the time domain, meter breakpoints in the
//! position domain. Within one tempo segment the position advances at
//! `1 / (numerator * beat_duration)` measures per second, where the numerator
//! belongs to the measure being crossed. There is no closed form over the
//! whole timeline, so both directions locate the governing tempo point by
//! binary search and then walk the meter breakpoints inside that segment.
//!
//! A measure that straddles a tempo change is split proportionally by
//! seconds: the fraction completed under the old tempo is kept and the rest
//! of the measure proceeds at the new tempo.

use serde::{Deserialize, Serialize};

use crate::{TimeSignature, TimeSignatureStore, TimingPointStore};

/// Positions within this distance of a whole number count as that measure.
const POSITION_EPSILON: f64 = 1e-9;

/// Measure containing `musical_position`.
pub fn measure_of(musical_position: f64) -> i64 {
    (musical_position + POSITION_EPSILON).floor() as i64
}

/// Walks forward from `(start_time, start_position)` under a constant beat
/// duration until `target_time` is reached and returns the position there.
pub(crate) fn advance_to_time(
    signatures: &TimeSignatureStore,
    start_time: f64,
    start_position: f64,
    beat_duration: f64,
    target_time: f64,
) -> f64 {
    let mut time = start_time;
    let mut position = start_position;
    // One step per meter span; the last span is unbounded.
    for _ in 0..=signatures.len() {
        let measure = measure_of(position);
        let measure_duration = measure_duration(signatures, measure, beat_duration);
        let span_end = span_end(signatures, measure);
        let span_seconds = (span_end - position) * measure_duration;

        if time + span_seconds >= target_time {
            return position + (target_time - time) / measure_duration;
        }
        time += span_seconds;
        position = span_end;
    }
    f64::NAN
}

/// Inverse of [`advance_to_time`]: walks forward until `target_position` and
/// returns the time there.
pub(crate) fn advance_to_position(
    signatures: &TimeSignatureStore,
    start_time: f64,
    start_position: f64,
    beat_duration: f64,
    target_position: f64,
) -> f64 {
    let mut time = start_time;
    let mut position = start_position;
    for _ in 0..=signatures.len() {
        let measure = measure_of(position);
        let measure_duration = measure_duration(signatures, measure, beat_duration);
        let span_end = span_end(signatures, measure);

        if target_position <= span_end {
            return time + (target_position - position) * measure_duration;
        }
        time += (span_end - position) * measure_duration;
        position = span_end;
    }
    f64::NAN
}

fn measure_duration(signatures: &TimeSignatureStore, measure: i64, beat_duration: f64) -> f64 {
    f64::from(signatures.signature_at(measure).numerator) * beat_duration
}

/// Position where the meter active at `measure` stops applying.
fn span_end(signatures: &TimeSignatureStore, measure: i64) -> f64 {
    signatures
        .next_change_after(measure)
        .map(|next| next as f64)
        .unwrap_or(f64::INFINITY)
}

/// A tempo breakpoint in the flattened sequence handed to exporters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpandedPoint {
    pub offset_seconds: f64,
    pub bpm: f64,
    pub musical_position: f64,
    /// Signature active from this point on.
    pub signature: TimeSignature,
    /// True for points inserted at a meter change.
    pub synthetic: bool,
}

impl ExpandedPoint {
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }
}

/// Read-only view over both stores answering coordinate queries.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateConverter<'a> {
    points: &'a TimingPointStore,
    signatures: &'a TimeSignatureStore,
}

impl<'a> CoordinateConverter<'a> {
    pub fn new(points: &'a TimingPointStore, signatures: &'a TimeSignatureStore) -> Self {
        Self { points, signatures }
    }

    /// Position at `time_seconds`. NaN maps to NaN.
    pub fn time_to_musical_position(&self, time_seconds: f64) -> f64 {
        if time_seconds.is_nan() {
            return f64::NAN;
        }
        let point = self.points.point_at_or_before_time(time_seconds);
        if time_seconds < point.offset_seconds() {
            // Before the first point: extrapolate backwards with its tempo.
            let measure_duration =
                measure_duration(self.signatures, -1, point.beat_duration_seconds());
            return (time_seconds - point.offset_seconds()) / measure_duration;
        }

        advance_to_time(
            self.signatures,
            point.offset_seconds(),
            point.musical_position(),
            point.beat_duration_seconds(),
            time_seconds,
        )
    }

    pub fn musical_position_to_time(&self, musical_position: f64) -> f64 {
        if musical_position.is_nan() {
            return f64::NAN;
        }
        let point = self.points.point_at_or_before_position(musical_position);
        if musical_position < point.musical_position() {
            let measure_duration =
                measure_duration(self.signatures, -1, point.beat_duration_seconds());
            return point.offset_seconds() + musical_position * measure_duration;
        }

        advance_to_position(
            self.signatures,
            point.offset_seconds(),
            point.musical_position(),
            point.beat_duration_seconds(),
            musical_position,
        )
    }

    /// Last measure reached by audio of the given length.
    pub fn last_measure(&self, duration_seconds: f64) -> i64 {
        self.time_to_musical_position(duration_seconds).floor() as i64
    }

    /// Copies the tempo breakpoints and adds a synthetic point at every
    /// measure where the meter changes, so a format that only knows tempo
    /// breakpoints with a per-point meter still renders the right grid.
    /// The result is sorted by offset.
    pub fn expand_with_boundary_points(&self) -> Vec<ExpandedPoint> {
        let mut expanded: Vec<ExpandedPoint> = self
            .points
            .points()
            .iter()
            .map(|point| ExpandedPoint {
                offset_seconds: point.offset_seconds(),
                bpm: point.bpm(),
                musical_position: point.musical_position(),
                signature: self
                    .signatures
                    .signature_at(measure_of(point.musical_position())),
                synthetic: false,
            })
            .collect();

        let changes = self
            .signatures
            .points()
            .windows(2)
            .filter(|pair| pair[0].signature() != pair[1].signature())
            .map(|pair| pair[1]);

        for change in changes {
            let position = change.measure_index() as f64;
            let already_covered = self
                .points
                .points()
                .iter()
                .any(|p| (p.musical_position() - position).abs() <= POSITION_EPSILON);
            if already_covered {
                continue;
            }

            let governing = self.points.point_at_or_before_position(position);
            expanded.push(ExpandedPoint {
                offset_seconds: self.musical_position_to_time(position),
                bpm: governing.bpm(),
                musical_position: position,
                signature: change.signature(),
                synthetic: true,
            });
        }

        expanded.sort_by(|a, b| a.offset_seconds.total_cmp(&b.offset_seconds));
        expanded
    }
}
