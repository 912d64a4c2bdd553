//! Meter breakpoints keyed by measure index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Rejected;

/// Beat units a signature may use.
pub const ALLOWED_DENOMINATORS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats per measure.
    pub numerator: u32,
    /// Beat unit.
    pub denominator: u32,
}

impl TimeSignature {
    pub const COMMON: Self = Self {
        numerator: 4,
        denominator: 4,
    };

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Returns this signature with the numerator raised to at least one and
    /// the denominator snapped onto [`ALLOWED_DENOMINATORS`].
    pub fn corrected(self) -> Self {
        correct_time_signature(i64::from(self.numerator), i64::from(self.denominator))
    }

    pub fn is_valid(&self) -> bool {
        self.numerator >= 1 && ALLOWED_DENOMINATORS.contains(&self.denominator)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Validates raw stepper input. The numerator is clamped to `>= 1`; the
/// denominator snaps to the allowed power of two closest on a logarithmic
/// scale, so 3 becomes 4 and 6 becomes 8.
pub fn correct_time_signature(numerator: i64, denominator: i64) -> TimeSignature {
    let numerator = numerator.clamp(1, i64::from(u32::MAX)) as u32;
    let denominator = if denominator <= 1 {
        1
    } else {
        let exponent = (denominator as f64).log2().round().clamp(0.0, 6.0) as u32;
        1 << exponent
    };
    TimeSignature {
        numerator,
        denominator,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignaturePoint {
    measure_index: i64,
    signature: TimeSignature,
}

impl TimeSignaturePoint {
    pub fn measure_index(&self) -> i64 {
        self.measure_index
    }

    pub fn signature(&self) -> TimeSignature {
        self.signature
    }

    pub fn numerator(&self) -> u32 {
        self.signature.numerator
    }
}

/// Ordered meter breakpoints. The first entry always sits at measure 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureStore {
    points: Vec<TimeSignaturePoint>,
}

impl TimeSignatureStore {
    pub fn new(initial: TimeSignature) -> Self {
        Self {
            points: vec![TimeSignaturePoint {
                measure_index: 0,
                signature: initial.corrected(),
            }],
        }
    }

    pub fn points(&self) -> &[TimeSignaturePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the breakpoint placed exactly at `measure_index`, if any.
    pub fn get(&self, measure_index: i64) -> Option<&TimeSignaturePoint> {
        self.points
            .binary_search_by_key(&measure_index, |p| p.measure_index)
            .ok()
            .map(|index| &self.points[index])
    }

    /// Overwrites or inserts the breakpoint at `measure_index` and returns the
    /// corrected signature that was stored. Negative measures address the
    /// first breakpoint.
    pub fn update(
        &mut self,
        measure_index: i64,
        numerator: i64,
        denominator: i64,
    ) -> TimeSignature {
        let measure_index = measure_index.max(0);
        let signature = correct_time_signature(numerator, denominator);

        match self
            .points
            .binary_search_by_key(&measure_index, |p| p.measure_index)
        {
            Ok(index) => self.points[index].signature = signature,
            Err(index) => self.points.insert(
                index,
                TimeSignaturePoint {
                    measure_index,
                    signature,
                },
            ),
        }

        debug_assert!(self.is_consistent());
        signature
    }

    pub fn remove(&mut self, measure_index: i64) -> Result<TimeSignaturePoint, Rejected> {
        if measure_index == 0 {
            return Err(Rejected::FirstSignature);
        }
        let index = self
            .points
            .binary_search_by_key(&measure_index, |p| p.measure_index)
            .map_err(|_| Rejected::UnknownSignature(measure_index))?;
        Ok(self.points.remove(index))
    }

    /// Relocates the breakpoint at `from` to measure `to`.
    pub fn move_to(&mut self, from: i64, to: i64) -> Result<(), Rejected> {
        if from == 0 {
            return Err(Rejected::FirstSignature);
        }
        if from == to {
            return self
                .get(from)
                .map(|_| ())
                .ok_or(Rejected::UnknownSignature(from));
        }
        if to <= 0 || self.get(to).is_some() {
            return Err(Rejected::SignatureCollision(to.max(0)));
        }

        let point = self.remove(from)?;
        self.update(
            to,
            i64::from(point.signature.numerator),
            i64::from(point.signature.denominator),
        );
        Ok(())
    }

    /// Active signature at `measure_index`: the breakpoint with the greatest
    /// measure not after it, or the first breakpoint for earlier measures.
    pub fn signature_at(&self, measure_index: i64) -> TimeSignature {
        let upper = self.points.partition_point(|p| p.measure_index <= measure_index);
        self.points[upper.saturating_sub(1)].signature
    }

    /// Measure of the first breakpoint strictly after `measure_index`.
    pub fn next_change_after(&self, measure_index: i64) -> Option<i64> {
        let upper = self.points.partition_point(|p| p.measure_index <= measure_index);
        self.points.get(upper).map(|p| p.measure_index)
    }

    pub fn clear(&mut self, initial: TimeSignature) {
        *self = Self::new(initial);
    }

    pub fn is_consistent(&self) -> bool {
        self.points.first().map(|p| p.measure_index) == Some(0)
            && self.points.iter().all(|p| p.signature.is_valid())
            && self
                .points
                .windows(2)
                .all(|pair| pair[0].measure_index < pair[1].measure_index)
    }
}

impl Default for TimeSignatureStore {
    fn default() -> Self {
        Self::new(TimeSignature::COMMON)
    }
}
