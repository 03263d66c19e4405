//! Interval matrices and the linear-algebra kernel over them.
//!
//! Vectors are column vectors of shape `n x 1` throughout.

use crate::interval::Interval;
use iota_core::{IotaError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A rectangular matrix of intervals with fixed dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalMatrix {
    data: Array2<Interval>,
}

impl IntervalMatrix {
    /// Wrap an existing array of intervals.
    pub fn new(data: Array2<Interval>) -> Self {
        Self { data }
    }

    /// Build a matrix by evaluating `f(row, col)` for every cell.
    pub fn from_fn<F>(nrows: usize, ncols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Interval,
    {
        Self {
            data: Array2::from_shape_fn((nrows, ncols), |(i, j)| f(i, j)),
        }
    }

    /// All-zero matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: Array2::from_elem((nrows, ncols), Interval::zero()),
        }
    }

    /// Widen each point value by `epsilon`.
    pub fn from_points(points: &Array2<f64>, epsilon: f64) -> Self {
        Self {
            data: points.mapv(|v| Interval::from_point(v, epsilon)),
        }
    }

    /// Column vector `n x 1` from point values widened by `epsilon`.
    pub fn column_from_points(points: &[f64], epsilon: f64) -> Self {
        Self::from_fn(points.len(), 1, |i, _| {
            Interval::from_point(points[i], epsilon)
        })
    }

    /// Column vector `n x 1` from intervals.
    pub fn column(values: &[Interval]) -> Self {
        Self::from_fn(values.len(), 1, |i, _| values[i])
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.nrows(), self.ncols()]
    }

    /// True if this matrix has exactly one column.
    #[inline]
    pub fn is_column(&self) -> bool {
        self.ncols() == 1
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&Interval> {
        self.data.get((row, col))
    }

    /// Copy of row `index` as a `1 x ncols` matrix.
    pub fn row(&self, index: usize) -> Option<IntervalMatrix> {
        if index >= self.nrows() {
            return None;
        }
        Some(Self {
            data: self.data.row(index).to_owned().insert_axis(ndarray::Axis(0)),
        })
    }

    /// Underlying array.
    #[inline]
    pub fn as_array(&self) -> &Array2<Interval> {
        &self.data
    }

    /// Iterate over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.data.iter()
    }

    /// Entries of a column vector, top to bottom.
    pub fn to_column_vec(&self) -> Result<Vec<Interval>> {
        if !self.is_column() {
            return Err(IotaError::shape_mismatch(
                "to_column_vec",
                vec![self.nrows(), 1],
                self.shape().to_vec(),
            ));
        }
        Ok(self.data.column(0).to_vec())
    }

    /// Non-negative part of the sign split.
    pub fn positive_part(&self) -> IntervalMatrix {
        Self {
            data: self.data.mapv(positive_part),
        }
    }

    /// Non-positive part of the sign split.
    pub fn negative_part(&self) -> IntervalMatrix {
        Self {
            data: self.data.mapv(negative_part),
        }
    }

    /// Split into `(pos, neg)` with `pos + neg == self`, `pos >= 0`, `neg <= 0`
    /// entrywise.
    pub fn sign_split(&self) -> (IntervalMatrix, IntervalMatrix) {
        (self.positive_part(), self.negative_part())
    }

    /// Matrix product `self @ rhs`.
    pub fn matmul(&self, rhs: &IntervalMatrix) -> Result<IntervalMatrix> {
        if self.ncols() != rhs.nrows() {
            return Err(IotaError::shape_mismatch(
                "matmul",
                vec![self.ncols(), rhs.ncols()],
                rhs.shape().to_vec(),
            ));
        }
        let (n, m, q) = (self.nrows(), self.ncols(), rhs.ncols());
        let data = Array2::from_shape_fn((n, q), |(i, j)| {
            (0..m).map(|k| self.data[[i, k]] * rhs.data[[k, j]]).sum()
        });
        Ok(Self { data })
    }

    /// Pointwise sum of two equally shaped matrices.
    pub fn add(&self, rhs: &IntervalMatrix) -> Result<IntervalMatrix> {
        if self.shape() != rhs.shape() {
            return Err(IotaError::shape_mismatch(
                "add",
                self.shape().to_vec(),
                rhs.shape().to_vec(),
            ));
        }
        let mut data = self.data.clone();
        ndarray::Zip::from(&mut data)
            .and(&rhs.data)
            .for_each(|a, &b| *a = *a + b);
        Ok(Self { data })
    }
}

/// Sign-split positive part of one interval.
#[inline]
pub fn positive_part(a: Interval) -> Interval {
    if a.straddles_zero() {
        Interval::new(0.0, a.sup())
    } else if a.is_nonnegative() {
        a
    } else {
        Interval::zero()
    }
}

/// Sign-split negative part of one interval.
#[inline]
pub fn negative_part(a: Interval) -> Interval {
    if a.straddles_zero() {
        Interval::new(a.inf(), 0.0)
    } else if a.is_nonnegative() {
        Interval::zero()
    } else {
        a
    }
}

/// Split a matrix into non-negative and non-positive parts.
pub fn sign_split(m: &IntervalMatrix) -> (IntervalMatrix, IntervalMatrix) {
    m.sign_split()
}

/// Matrix product with shape checking.
pub fn mat_mul(a: &IntervalMatrix, b: &IntervalMatrix) -> Result<IntervalMatrix> {
    a.matmul(b)
}

/// Pointwise sum of two or more equally shaped vectors.
pub fn vec_add(operands: &[&IntervalMatrix]) -> Result<IntervalMatrix> {
    match operands {
        [] | [_] => Err(IotaError::shape_mismatch(
            "vec_add operand count",
            vec![2],
            vec![operands.len()],
        )),
        [first, rest @ ..] => rest.iter().try_fold((*first).clone(), |acc, v| acc.add(v)),
    }
}

/// Largest upper end among the cells, `-inf` for an empty matrix.
pub fn max_upper(vector: &IntervalMatrix) -> f64 {
    vector
        .iter()
        .map(Interval::sup)
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Largest upper end among the rows of a column vector, skipping row `skip`.
pub fn max_upper_excluding(vector: &IntervalMatrix, skip: usize) -> f64 {
    vector
        .as_array()
        .indexed_iter()
        .filter(|((row, _), _)| *row != skip)
        .map(|(_, x)| x.sup())
        .fold(f64::NEG_INFINITY, f64::max)
}
