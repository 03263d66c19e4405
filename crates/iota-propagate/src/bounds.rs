//! Input/output boxes as pairs of interval column vectors.

use iota_core::{IotaError, Result};
use iota_interval::{Interval, IntervalMatrix};
use serde::{Deserialize, Serialize};

/// A box described by a lower and an upper interval column vector.
///
/// Component `i` of the box is the real range
/// `[lower[i].inf, upper[i].sup]`. Both vectors are `m x 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsPair {
    lower: IntervalMatrix,
    upper: IntervalMatrix,
}

impl BoundsPair {
    /// Pair two interval vectors, checking shapes and `lower[i].inf <= upper[i].sup`.
    pub fn new(lower: IntervalMatrix, upper: IntervalMatrix) -> Result<Self> {
        if !lower.is_column() {
            return Err(IotaError::shape_mismatch(
                "bounds lower",
                vec![lower.nrows(), 1],
                lower.shape().to_vec(),
            ));
        }
        if lower.shape() != upper.shape() {
            return Err(IotaError::shape_mismatch(
                "bounds upper",
                lower.shape().to_vec(),
                upper.shape().to_vec(),
            ));
        }
        for (index, (lo, hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !(lo.inf() <= hi.sup()) {
                return Err(IotaError::InvalidBox {
                    index,
                    lower: lo.inf(),
                    upper: hi.sup(),
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Box from point bounds, each widened by `epsilon`.
    ///
    /// The raw bounds are validated before widening: every value must be
    /// finite and `lower[i] <= upper[i]`.
    pub fn from_points(lower: &[f64], upper: &[f64], epsilon: f64) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(IotaError::shape_mismatch(
                "box bounds",
                vec![lower.len()],
                vec![upper.len()],
            ));
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(IotaError::InvalidSpec(format!(
                    "non-finite bound at index {index}: [{lo}, {hi}]"
                )));
            }
            if lo > hi {
                return Err(IotaError::InvalidBox {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Self::new(
            IntervalMatrix::column_from_points(lower, epsilon),
            IntervalMatrix::column_from_points(upper, epsilon),
        )
    }

    #[inline]
    pub fn lower(&self) -> &IntervalMatrix {
        &self.lower
    }

    #[inline]
    pub fn upper(&self) -> &IntervalMatrix {
        &self.upper
    }

    /// Number of components.
    #[inline]
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Per-component real range, the hull of `lower[i]` and `upper[i]`.
    pub fn ranges(&self) -> Vec<Interval> {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(lo, hi)| lo.hull(hi))
            .collect()
    }

    /// Lower ends `lower[i].inf`.
    pub fn lower_ends(&self) -> Vec<f64> {
        self.lower.iter().map(Interval::inf).collect()
    }

    /// Upper ends `upper[i].sup`.
    pub fn upper_ends(&self) -> Vec<f64> {
        self.upper.iter().map(Interval::sup).collect()
    }

    /// True if `point` lies inside the box.
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dim()
            && self
                .ranges()
                .iter()
                .zip(point)
                .all(|(range, &x)| range.contains(x))
    }

    /// Largest component width.
    pub fn max_width(&self) -> f64 {
        self.ranges()
            .iter()
            .map(Interval::width)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_valid() {
        let b = BoundsPair::from_points(&[0.0, -1.0], &[1.0, -1.0], 0.0).unwrap();
        assert_eq!(b.dim(), 2);
        assert_eq!(b.lower_ends(), vec![0.0, -1.0]);
        assert_eq!(b.upper_ends(), vec![1.0, -1.0]);
        assert_eq!(b.max_width(), 1.0);
    }

    #[test]
    fn test_from_points_widens_by_epsilon() {
        let b = BoundsPair::from_points(&[0.0], &[1.0], 0.25).unwrap();
        assert_eq!(b.ranges(), vec![Interval::new(-0.25, 1.25)]);
    }

    #[test]
    fn test_from_points_rejects_reversed_component() {
        let err = BoundsPair::from_points(&[0.0, 2.0], &[1.0, 1.0], 0.0).unwrap_err();
        match err {
            IotaError::InvalidBox {
                index,
                lower,
                upper,
            } => {
                assert_eq!(index, 1);
                assert_eq!(lower, 2.0);
                assert_eq!(upper, 1.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_points_rejects_length_mismatch() {
        let err = BoundsPair::from_points(&[0.0, 1.0], &[1.0], 0.0).unwrap_err();
        assert!(matches!(err, IotaError::ShapeMismatch { .. }), "{err}");
    }

    #[test]
    fn test_from_points_rejects_non_finite() {
        let err = BoundsPair::from_points(&[f64::NAN], &[1.0], 0.0).unwrap_err();
        assert!(matches!(err, IotaError::InvalidSpec(_)), "{err}");
        let err = BoundsPair::from_points(&[0.0], &[f64::INFINITY], 0.0).unwrap_err();
        assert!(matches!(err, IotaError::InvalidSpec(_)), "{err}");
    }

    #[test]
    fn test_new_rejects_row_vectors() {
        let row = IntervalMatrix::zeros(1, 3);
        let err = BoundsPair::new(row.clone(), row).unwrap_err();
        assert!(matches!(err, IotaError::ShapeMismatch { .. }), "{err}");
    }

    #[test]
    fn test_new_checks_inf_against_sup() {
        // Overlapping intervals are fine as long as lower.inf <= upper.sup.
        let lower = IntervalMatrix::column(&[Interval::new(0.0, 2.0)]);
        let upper = IntervalMatrix::column(&[Interval::new(1.0, 1.5)]);
        assert!(BoundsPair::new(lower, upper).is_ok());

        let lower = IntervalMatrix::column(&[Interval::new(2.0, 3.0)]);
        let upper = IntervalMatrix::column(&[Interval::new(0.0, 1.0)]);
        assert!(matches!(
            BoundsPair::new(lower, upper),
            Err(IotaError::InvalidBox { index: 0, .. })
        ));
    }

    #[test]
    fn test_contains() {
        let b = BoundsPair::from_points(&[0.0, 0.0], &[1.0, 2.0], 0.0).unwrap();
        assert!(b.contains(&[0.5, 2.0]));
        assert!(!b.contains(&[1.5, 0.0]));
        assert!(!b.contains(&[0.5]));
    }
}
