//! Piecewise-linear calibration of raw meter readings.
//!
//! Transceivers report meters (S-meter, SWR, ALC, power) as raw integers on
//! a scale that is neither linear nor consistent across models. A
//! [`CalibrationTable`] maps those raw readings to calibrated units by
//! linear interpolation between measured points.
//!
//! The same lookup serves integer-valued quantities (S-meter in dB relative
//! to S9) and floating-point quantities (SWR ratio):
//!
//! ```
//! use rigcat_core::calibration::CalibrationTable;
//!
//! let smeter = CalibrationTable::from_pairs(&[(0, -54), (15, 0), (30, 60)]).unwrap();
//! assert_eq!(smeter.value_at(-5), -54);
//! assert_eq!(smeter.value_at(100), 60);
//!
//! let swr = CalibrationTable::from_pairs(&[(0, 1.0f32), (12, 2.0), (30, 10.0)]).unwrap();
//! assert!((swr.value_at(6) - 1.5).abs() < 1e-6);
//! ```

use crate::error::{Error, Result};

/// Maximum number of points a calibration table may hold.
pub const MAX_CAL_POINTS: usize = 32;

/// One measured point: a raw device reading and the value it represents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalPoint<V> {
    pub raw: i32,
    pub value: V,
}

/// An ordered table of calibration points.
///
/// Raw values are non-decreasing. An empty table means "not calibrated"
/// and converts every reading to itself. Tables are immutable once built
/// and can be shared freely between sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable<V> {
    points: Vec<CalPoint<V>>,
}

impl<V> Default for CalibrationTable<V> {
    fn default() -> Self {
        CalibrationTable { points: Vec::new() }
    }
}

impl<V: Copy + Into<f64>> CalibrationTable<V> {
    /// An uncalibrated (identity) table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from measured points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the table holds more than
    /// [`MAX_CAL_POINTS`] points or its raw values ever decrease.
    pub fn new(points: Vec<CalPoint<V>>) -> Result<Self> {
        if points.len() > MAX_CAL_POINTS {
            return Err(Error::InvalidArgument(format!(
                "calibration table has {} points, limit is {MAX_CAL_POINTS}",
                points.len()
            )));
        }
        if let Some(pair) = points.windows(2).find(|w| w[1].raw < w[0].raw) {
            return Err(Error::InvalidArgument(format!(
                "calibration raw values must not decrease ({} after {})",
                pair[1].raw, pair[0].raw
            )));
        }
        Ok(CalibrationTable { points })
    }

    /// Build a table from `(raw, value)` pairs.
    pub fn from_pairs(pairs: &[(i32, V)]) -> Result<Self> {
        Self::new(
            pairs
                .iter()
                .map(|&(raw, value)| CalPoint { raw, value })
                .collect(),
        )
    }

    /// The points in this table, in raw order.
    pub fn points(&self) -> &[CalPoint<V>] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Interpolate a raw reading without rounding.
    ///
    /// Below the first point the first value is returned and above the last
    /// point the last value. Between two points the result lies on the
    /// straight line joining them. When two consecutive points share a raw
    /// value the later one wins. An empty table returns `raw` unchanged.
    pub fn interpolate(&self, raw: i32) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return f64::from(raw),
        };

        // First point strictly above the reading.
        let i = match self.points.iter().position(|p| raw < p.raw) {
            Some(0) => return first.value.into(),
            Some(i) => i,
            None => return last.value.into(),
        };

        let hi = &self.points[i];
        let lo = &self.points[i - 1];
        if hi.raw == lo.raw {
            return hi.value.into();
        }

        let hi_val: f64 = hi.value.into();
        let lo_val: f64 = lo.value.into();
        let span = f64::from(hi.raw) - f64::from(lo.raw);
        hi_val - (f64::from(hi.raw) - f64::from(raw)) * (hi_val - lo_val) / span
    }
}

impl CalibrationTable<i32> {
    /// Calibrated integer value for a raw reading, truncated toward zero.
    pub fn value_at(&self, raw: i32) -> i32 {
        self.interpolate(raw) as i32
    }
}

impl CalibrationTable<f32> {
    /// Calibrated floating-point value for a raw reading.
    pub fn value_at(&self, raw: i32) -> f32 {
        self.interpolate(raw) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts2000_str() -> CalibrationTable<i32> {
        CalibrationTable::from_pairs(&[
            (0, -54),
            (3, -48),
            (6, -36),
            (9, -24),
            (12, -12),
            (15, 0),
            (20, 20),
            (25, 40),
            (30, 60),
        ])
        .unwrap()
    }

    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    #[test]
    fn rejects_decreasing_raw() {
        let err = CalibrationTable::from_pairs(&[(0, 0), (10, 5), (5, 8)]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn rejects_oversized_table() {
        let pairs: Vec<(i32, i32)> = (0..=MAX_CAL_POINTS as i32).map(|r| (r, r)).collect();
        let err = CalibrationTable::from_pairs(&pairs).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn accepts_repeated_raw() {
        let table = CalibrationTable::from_pairs(&[(0, 0), (5, 10), (5, 20), (10, 30)]).unwrap();
        assert_eq!(table.points().len(), 4);
    }

    // ---------------------------------------------------------------
    // Identity fallback
    // ---------------------------------------------------------------

    #[test]
    fn empty_table_is_identity() {
        let table: CalibrationTable<i32> = CalibrationTable::empty();
        for raw in [-100, -1, 0, 7, 255, i32::MAX] {
            assert_eq!(table.value_at(raw), raw);
        }
        let table: CalibrationTable<f32> = CalibrationTable::empty();
        assert_eq!(table.value_at(12), 12.0);
    }

    // ---------------------------------------------------------------
    // Clamping and interpolation
    // ---------------------------------------------------------------

    #[test]
    fn three_point_table() {
        let table = CalibrationTable::from_pairs(&[(0, -54), (15, 0), (30, 60)]).unwrap();
        assert_eq!(table.value_at(-5), -54);
        assert_eq!(table.value_at(100), 60);
        assert!((table.interpolate(7) - (-28.8)).abs() < 1e-9);
        assert_eq!(table.value_at(7), -28);
    }

    #[test]
    fn clamps_at_both_ends() {
        let table = ts2000_str();
        assert_eq!(table.value_at(i32::MIN), -54);
        assert_eq!(table.value_at(0), -54);
        assert_eq!(table.value_at(30), 60);
        assert_eq!(table.value_at(i32::MAX), 60);
    }

    #[test]
    fn exact_points_return_their_value() {
        let table = ts2000_str();
        for p in table.points() {
            assert_eq!(table.value_at(p.raw), p.value);
        }
    }

    #[test]
    fn monotone_for_monotone_values() {
        let table = ts2000_str();
        let mut prev = f64::NEG_INFINITY;
        for raw in -10..=40 {
            let v = table.interpolate(raw);
            assert!(v >= prev, "not monotone at raw {raw}: {v} < {prev}");
            prev = v;
        }
    }

    #[test]
    fn repeated_raw_prefers_later_point() {
        let table = CalibrationTable::from_pairs(&[(0, 0), (5, 10), (5, 20), (10, 30)]).unwrap();
        assert_eq!(table.value_at(5), 20);
        assert_eq!(table.value_at(4), 8);
    }

    #[test]
    fn single_point_table_clamps() {
        let table = CalibrationTable::from_pairs(&[(10, 3)]).unwrap();
        assert_eq!(table.value_at(0), 3);
        assert_eq!(table.value_at(10), 3);
        assert_eq!(table.value_at(20), 3);
    }

    #[test]
    fn float_swr_table() {
        let swr = CalibrationTable::from_pairs(&[
            (0, 1.0f32),
            (6, 1.5),
            (12, 2.0),
            (18, 3.0),
            (30, 10.0),
        ])
        .unwrap();
        assert!((swr.value_at(0) - 1.0).abs() < 1e-6);
        assert!((swr.value_at(3) - 1.25).abs() < 1e-6);
        assert!((swr.value_at(15) - 2.5).abs() < 1e-6);
        assert!((swr.value_at(24) - 6.5).abs() < 1e-6);
        assert!((swr.value_at(99) - 10.0).abs() < 1e-6);
    }
}
