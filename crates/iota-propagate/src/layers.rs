//! Layers that push an input box through to a sound output box.

use crate::bounds::BoundsPair;
use iota_core::{IotaError, Result};
use iota_interval::{mat_mul, vec_add, IntervalMatrix};
use ndarray::{Array1, Array2, ArrayView1};
use tracing::debug;

/// A network layer that supports sound interval bound propagation.
///
/// For every concrete input inside `input`, the layer's true output lies
/// inside the returned box.
pub trait Layer: Send + Sync {
    /// Length of the input vector.
    fn input_dim(&self) -> usize;

    /// Length of the output vector.
    fn output_dim(&self) -> usize;

    /// Propagate an input box to an output box.
    fn propagate(&self, input: &BoundsPair) -> Result<BoundsPair>;

    /// Human-readable layer kind.
    fn kind(&self) -> &'static str;
}

/// Fully connected layer `y = W x + b` with interval-valued parameters.
///
/// Built once from point-valued parameters plus a tolerance and immutable
/// afterwards, so a single layer can be shared by concurrent verification runs.
#[derive(Debug, Clone)]
pub struct LinearLayer {
    weight: IntervalMatrix,
    bias: IntervalMatrix,
    weight_pos: IntervalMatrix,
    weight_neg: IntervalMatrix,
    weight_points: Array2<f64>,
    bias_points: Array1<f64>,
    tolerance: f64,
}

impl LinearLayer {
    /// Build a layer from an `n x m` weight matrix and a length-`n` bias.
    ///
    /// Every entry is widened to `[v - tolerance, v + tolerance]`.
    pub fn build(weight: Array2<f64>, bias: Array1<f64>, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(IotaError::InvalidModel(format!(
                "tolerance must be finite and non-negative, got {tolerance}"
            )));
        }
        let (n, m) = weight.dim();
        if n == 0 || m == 0 {
            return Err(IotaError::InvalidModel(format!(
                "weight matrix must be non-empty, got {n}x{m}"
            )));
        }
        if bias.len() != n {
            return Err(IotaError::shape_mismatch(
                "linear bias",
                vec![n],
                vec![bias.len()],
            ));
        }
        if let Some(v) = weight.iter().chain(bias.iter()).find(|v| !v.is_finite()) {
            return Err(IotaError::InvalidModel(format!(
                "layer parameters must be finite, found {v}"
            )));
        }

        let weight_iv = IntervalMatrix::from_points(&weight, tolerance);
        let bias_iv = IntervalMatrix::from_fn(n, 1, |i, _| {
            iota_interval::Interval::from_point(bias[i], tolerance)
        });
        let (weight_pos, weight_neg) = weight_iv.sign_split();
        debug!("Built linear layer {}x{} (tolerance {:e})", n, m, tolerance);

        Ok(Self {
            weight: weight_iv,
            bias: bias_iv,
            weight_pos,
            weight_neg,
            weight_points: weight,
            bias_points: bias,
            tolerance,
        })
    }

    /// Build from nested rows, as produced by loaders.
    pub fn from_rows(weight: &[Vec<f64>], bias: &[f64], tolerance: f64) -> Result<Self> {
        let n = weight.len();
        let m = weight.first().map_or(0, Vec::len);
        if let Some(bad) = weight.iter().find(|row| row.len() != m) {
            return Err(IotaError::shape_mismatch(
                "weight row",
                vec![m],
                vec![bad.len()],
            ));
        }
        let flat: Vec<f64> = weight.iter().flatten().copied().collect();
        let weight = Array2::from_shape_vec((n, m), flat)
            .map_err(|e| IotaError::InvalidModel(e.to_string()))?;
        Self::build(weight, Array1::from_vec(bias.to_vec()), tolerance)
    }

    /// Interval weight matrix (`n x m`).
    #[inline]
    pub fn weight(&self) -> &IntervalMatrix {
        &self.weight
    }

    /// Interval bias column (`n x 1`).
    #[inline]
    pub fn bias(&self) -> &IntervalMatrix {
        &self.bias
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Point-valued weights the layer was built from.
    #[inline]
    pub fn weight_points(&self) -> &Array2<f64> {
        &self.weight_points
    }

    /// Point-valued bias the layer was built from.
    #[inline]
    pub fn bias_points(&self) -> &Array1<f64> {
        &self.bias_points
    }

    /// Plain floating-point forward pass on the source parameters.
    pub fn evaluate(&self, x: &[f64]) -> Result<Array1<f64>> {
        if x.len() != self.input_dim() {
            return Err(IotaError::shape_mismatch(
                "evaluate",
                vec![self.input_dim()],
                vec![x.len()],
            ));
        }
        Ok(self.weight_points.dot(&ArrayView1::from(x)) + &self.bias_points)
    }
}

impl Layer for LinearLayer {
    fn input_dim(&self) -> usize {
        self.weight.ncols()
    }

    fn output_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// Sign-split propagation:
    /// `lower = W+ l + W- u + b`, `upper = W+ u + W- l + b`.
    fn propagate(&self, input: &BoundsPair) -> Result<BoundsPair> {
        if input.dim() != self.input_dim() {
            return Err(IotaError::shape_mismatch(
                "propagate",
                vec![self.input_dim()],
                vec![input.dim()],
            ));
        }

        let pos_lower = mat_mul(&self.weight_pos, input.lower())?;
        let neg_upper = mat_mul(&self.weight_neg, input.upper())?;
        let pos_upper = mat_mul(&self.weight_pos, input.upper())?;
        let neg_lower = mat_mul(&self.weight_neg, input.lower())?;

        let lower = vec_add(&[&pos_lower, &neg_upper, &self.bias])?;
        let upper = vec_add(&[&pos_upper, &neg_lower, &self.bias])?;

        BoundsPair::new(lower, upper)
    }

    fn kind(&self) -> &'static str {
        "Linear"
    }
}
