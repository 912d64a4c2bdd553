//! Text records for rhythm-game map export.

use std::fmt::Write as _;

use beatmap_timing_core::ExpandedPoint;

/// One `offset_ms,beat_length_ms,beats_per_measure` line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingLine {
    pub offset_ms: f64,
    pub beat_length_ms: f64,
    pub beats_per_measure: u32,
}

impl From<&ExpandedPoint> for TimingLine {
    fn from(point: &ExpandedPoint) -> Self {
        Self {
            offset_ms: point.offset_seconds * 1000.0,
            beat_length_ms: point.beat_duration_seconds() * 1000.0,
            beats_per_measure: point.signature.numerator,
        }
    }
}

/// Formats the expanded breakpoints, already in ascending time order.
pub fn format_timing_lines(points: &[ExpandedPoint]) -> String {
    let mut out = String::new();
    for line in points.iter().map(TimingLine::from) {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{},{},{}",
            line.offset_ms.round() as i64,
            trim_float(line.beat_length_ms),
            line.beats_per_measure
        );
    }
    out
}

fn trim_float(value: f64) -> String {
    let text = format!("{value:.12}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}
