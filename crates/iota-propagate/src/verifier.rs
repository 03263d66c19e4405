//! Main verifier: propagate the input box, then decide robustness.

use crate::bounds::BoundsPair;
use crate::decision::{aggregate, check_full, check_simple, validate_label, DisjunctVerdict};
use crate::layers::{Layer, LinearLayer};
use crate::refine::{NoRefinement, Refiner};
use crate::types::{DecisionMode, RobustnessProperty, VerifierConfig};
use iota_core::{Result, RobustnessOutcome};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Input widths above this are almost certainly a malformed property.
const WIDE_BOX_WARNING: f64 = 1e6;

/// Stage of the pipeline that produced the final outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Simple,
    Full,
    Refinement,
}

/// Result of one verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub outcome: RobustnessOutcome,
    pub label: usize,
    /// Per-disjunct verdicts; empty if only the simple check ran.
    pub verdicts: Vec<DisjunctVerdict>,
    /// Lower ends of the propagated output box.
    pub output_lower: Vec<f64>,
    /// Upper ends of the propagated output box.
    pub output_upper: Vec<f64>,
    pub decided_by: DecidedBy,
    pub tolerance: f64,
    pub elapsed_secs: f64,
}

impl VerificationReport {
    #[inline]
    pub fn is_robust(&self) -> bool {
        self.outcome.is_robust()
    }
}

/// Robustness verifier for a single linear layer.
///
/// # Example
/// ```
/// use iota_propagate::{RobustnessProperty, Verifier, VerifierConfig};
/// use ndarray::{arr1, arr2};
///
/// let verifier = Verifier::new(VerifierConfig::default().with_tolerance(0.0));
/// let layer = verifier.build_layer(arr2(&[[1.0, -1.0]]), arr1(&[0.0])).unwrap();
/// let property = RobustnessProperty::new(vec![0.0, 0.0], vec![1.0, 0.0], 1);
///
/// let report = verifier.verify(&layer, &property).unwrap();
/// assert!(report.is_robust());
/// ```
pub struct Verifier<R: Refiner = NoRefinement> {
    config: VerifierConfig,
    refiner: R,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            refiner: NoRefinement,
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

impl<R: Refiner> Verifier<R> {
    /// Replace the refinement stage.
    pub fn with_refiner<S: Refiner>(self, refiner: S) -> Verifier<S> {
        Verifier {
            config: self.config,
            refiner,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Build a layer whose parameters are widened by the configured tolerance.
    pub fn build_layer(&self, weight: Array2<f64>, bias: Array1<f64>) -> Result<LinearLayer> {
        self.config.validate()?;
        LinearLayer::build(weight, bias, self.config.effective_tolerance())
    }

    /// Input box of a property, widened by the configured tolerance.
    pub fn input_box(&self, property: &RobustnessProperty) -> Result<BoundsPair> {
        let input = BoundsPair::from_points(
            &property.input_lower,
            &property.input_upper,
            self.config.effective_tolerance(),
        )?;
        let width = input.max_width();
        if width == 0.0 {
            warn!("Input box has zero width; checking a single point");
        } else if width > WIDE_BOX_WARNING {
            warn!("Input box is very wide (max width {:e})", width);
        }
        Ok(input)
    }

    /// Propagate a property's input box through `layer`.
    pub fn output_bounds(
        &self,
        layer: &LinearLayer,
        property: &RobustnessProperty,
    ) -> Result<BoundsPair> {
        let input = self.input_box(property)?;
        layer.propagate(&input)
    }

    /// Check that every input in the property's box is classified as its label.
    pub fn verify(
        &self,
        layer: &LinearLayer,
        property: &RobustnessProperty,
    ) -> Result<VerificationReport> {
        let start = Instant::now();
        self.config.validate()?;
        let label = property.label;
        validate_label(layer.output_dim(), label)?;

        info!(
            "Starting verification: {}x{} {} layer, label {}, mode {:?}, {}-bit precision",
            layer.output_dim(),
            layer.input_dim(),
            layer.kind(),
            label,
            self.config.mode,
            self.config.precision.bits()
        );

        let input = self.input_box(property)?;
        let output = layer.propagate(&input)?;
        debug!(
            "Output box: lower {:?}, upper {:?}",
            output.lower_ends(),
            output.upper_ends()
        );

        let epsilon = self.config.effective_tolerance();
        let (mut outcome, verdicts, mut decided_by) = match self.config.mode {
            DecisionMode::Simple => (check_simple(&output, label)?, Vec::new(), DecidedBy::Simple),
            DecisionMode::Full => {
                let verdicts = check_full(&output, label, epsilon)?;
                (aggregate(&verdicts), verdicts, DecidedBy::Full)
            }
            DecisionMode::Auto => {
                let simple = check_simple(&output, label)?;
                if simple.is_decided() {
                    (simple, Vec::new(), DecidedBy::Simple)
                } else {
                    debug!("Simple check inconclusive, running full check");
                    let verdicts = check_full(&output, label, epsilon)?;
                    (aggregate(&verdicts), verdicts, DecidedBy::Full)
                }
            }
        };

        if !outcome.is_decided() {
            let refined = self
                .refiner
                .refine(layer, &input, label, &verdicts, outcome.clone());
            if refined != outcome {
                info!("Refiner '{}' resolved outcome: {}", self.refiner.name(), refined);
                decided_by = DecidedBy::Refinement;
            }
            outcome = refined;
        }

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!("Verification finished: {} ({:.3}s)", outcome, elapsed_secs);

        Ok(VerificationReport {
            outcome,
            label,
            verdicts,
            output_lower: output.lower_ends(),
            output_upper: output.upper_ends(),
            decided_by,
            tolerance: epsilon,
            elapsed_secs,
        })
    }

    /// Build the layer from point parameters and verify in one call.
    pub fn verify_points(
        &self,
        weight: Array2<f64>,
        bias: Array1<f64>,
        property: &RobustnessProperty,
    ) -> Result<VerificationReport> {
        let layer = self.build_layer(weight, bias)?;
        self.verify(&layer, property)
    }
}
