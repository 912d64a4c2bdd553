//! Beat grid arithmetic. Everything here is pure; the engine combines it with
//! coordinate conversion to place lines on the timeline.

use serde::{Deserialize, Serialize};

use crate::TimeSignature;

/// Visual weight of a grid line, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridTier {
    /// First line of a measure.
    Downbeat,
    /// On a beat.
    Quarter,
    /// On a triplet subdivision of the beat.
    Twelfth,
    /// On a four-way subdivision of the beat.
    Sixteenth,
    Unspecified,
}

/// A grid line placed on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLine {
    pub time_seconds: f64,
    pub musical_position: f64,
    pub measure: i64,
    /// Subdivision index inside the measure.
    pub index: u32,
    pub tier: GridTier,
}

pub fn subdivisions_per_measure(signature: TimeSignature, divisor: u32) -> u32 {
    signature.numerator.max(1).saturating_mul(divisor.max(1))
}

/// Position of subdivision `index` inside the measure, in `[0, 1)`.
pub fn relative_position(signature: TimeSignature, divisor: u32, index: u32) -> f64 {
    let total = subdivisions_per_measure(signature, divisor);
    f64::from(index % total) / f64::from(total)
}

/// True when subdivision `index` of a grid with `divisor` lines per beat lies
/// on a coarser line repeating every `reference` subdivisions within the beat.
pub fn is_aligned_to(divisor: u32, index: u32, reference: u32) -> bool {
    if divisor == 0 || reference == 0 {
        return false;
    }
    (index % divisor) % reference == 0
}

pub fn classify(signature: TimeSignature, divisor: u32, index: u32) -> GridTier {
    let divisor = divisor.max(1);
    let index = index % subdivisions_per_measure(signature, divisor);

    if index == 0 {
        GridTier::Downbeat
    } else if is_aligned_to(divisor, index, divisor) {
        GridTier::Quarter
    } else if divisor % 3 == 0 && is_aligned_to(divisor, index, divisor / 3) {
        GridTier::Twelfth
    } else if divisor % 4 == 0 && is_aligned_to(divisor, index, divisor / 4) {
        GridTier::Sixteenth
    } else {
        GridTier::Unspecified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_positions_span_the_measure() {
        let sig = TimeSignature::COMMON;
        assert_eq!(relative_position(sig, 4, 0), 0.0);
        assert_eq!(relative_position(sig, 4, 4), 0.25);
        assert_eq!(relative_position(sig, 4, 15), 15.0 / 16.0);
        assert_eq!(relative_position(TimeSignature::new(3, 4), 2, 3), 0.5);
    }

    #[test]
    fn alignment_on_sixteenth_grid() {
        assert!(is_aligned_to(4, 0, 4));
        assert!(is_aligned_to(4, 2, 2));
        assert!(!is_aligned_to(4, 1, 4));
        assert!(is_aligned_to(4, 8, 4));
        assert!(!is_aligned_to(0, 0, 4));
        assert!(!is_aligned_to(4, 0, 0));
    }

    #[test]
    fn classifies_lines() {
        let sig = TimeSignature::COMMON;
        assert_eq!(classify(sig, 4, 0), GridTier::Downbeat);
        assert_eq!(classify(sig, 4, 4), GridTier::Quarter);
        assert_eq!(classify(sig, 4, 2), GridTier::Sixteenth);
        assert_eq!(classify(sig, 12, 4), GridTier::Twelfth);
        assert_eq!(classify(sig, 12, 3), GridTier::Sixteenth);
        assert_eq!(classify(sig, 12, 1), GridTier::Unspecified);
        assert_eq!(classify(sig, 4, 16), GridTier::Downbeat);
    }
}
