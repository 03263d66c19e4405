//! Robustness decision over a propagated output box.
//!
//! A robustness property "every input in the box is classified as `label`"
//! is negated into a disjunction: for each competing class `i`, the disjunct
//! `y[label] - y[i] <= 0`. Each disjunct is checked against sound bounds of
//! its linear form, giving a three-valued [`Verdict`].

use crate::bounds::BoundsPair;
use iota_core::{IotaError, Result, RobustnessOutcome, Verdict};
use iota_interval::{mat_mul, max_upper_excluding, vec_add, Interval, IntervalMatrix};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a disjunct compares its linear form against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `r . y <= 0`: the competing class reaches at least the label score.
    NonStrict,
    /// `r . y < 0`: used for label 1 of a single-logit network.
    Strict,
}

/// Verdict of one disjunct, with the sound range of its linear form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisjunctVerdict {
    /// Competing class this disjunct stands for.
    pub class: usize,
    pub verdict: Verdict,
    /// Lower end of `min_val` and upper end of `max_val`.
    pub lower: f64,
    pub upper: f64,
}

/// Disjunction rows together with the class each row stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct DisjunctionMatrix {
    matrix: IntervalMatrix,
    classes: Vec<usize>,
    comparison: Comparison,
}

impl DisjunctionMatrix {
    /// Disjunction for a network with `outputs` logits and the given label.
    pub fn new(outputs: usize, label: usize) -> Result<Self> {
        let matrix = create_disjunction_matrix(outputs, label)?;
        let (classes, comparison) = if outputs == 1 {
            let comparison = if label == 1 {
                Comparison::Strict
            } else {
                Comparison::NonStrict
            };
            (vec![1 - label], comparison)
        } else {
            ((0..outputs).filter(|&i| i != label).collect(), Comparison::NonStrict)
        };
        Ok(Self {
            matrix,
            classes,
            comparison,
        })
    }

    #[inline]
    pub fn matrix(&self) -> &IntervalMatrix {
        &self.matrix
    }

    /// Class index of each row, in row order.
    #[inline]
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    #[inline]
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// Number of disjuncts.
    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Check that `label` names a class of a network with `outputs` logits.
///
/// A single-logit network is a binary classifier, so it accepts labels 0 and 1.
pub fn validate_label(outputs: usize, label: usize) -> Result<()> {
    let classes = if outputs == 1 { 2 } else { outputs };
    if outputs == 0 || label >= classes {
        return Err(IotaError::InvalidLabel { label, outputs });
    }
    Ok(())
}

/// Build the `(n-1) x n` disjunction matrix for `label`.
///
/// Row for class `i != label` has `+1` at column `label`, `-1` at column `i`
/// and `0` elsewhere. For `n == 1` the matrix is `[[+1]]` for label 1 and
/// `[[-1]]` for label 0.
pub fn create_disjunction_matrix(outputs: usize, label: usize) -> Result<IntervalMatrix> {
    validate_label(outputs, label)?;
    if outputs == 1 {
        let sign = if label == 1 { 1.0 } else { -1.0 };
        return Ok(IntervalMatrix::from_fn(1, 1, |_, _| Interval::point(sign)));
    }

    let others: Vec<usize> = (0..outputs).filter(|&i| i != label).collect();
    Ok(IntervalMatrix::from_fn(others.len(), outputs, |row, col| {
        if col == label {
            Interval::point(1.0)
        } else if col == others[row] {
            Interval::point(-1.0)
        } else {
            Interval::zero()
        }
    }))
}

/// Evaluate `pos(row) . first + neg(row) . second` for a `1 x n` row.
fn signed_dot(
    row: &IntervalMatrix,
    first: &IntervalMatrix,
    second: &IntervalMatrix,
) -> Result<Interval> {
    let (pos, neg) = row.sign_split();
    let sum = vec_add(&[&mat_mul(&pos, first)?, &mat_mul(&neg, second)?])?;
    sum.get(0, 0).copied().ok_or_else(|| {
        IotaError::shape_mismatch("disjunct row", vec![1, 1], sum.shape().to_vec())
    })
}

/// Sound lower range of `row . y` over the output box.
///
/// Its `inf` is a lower bound of the linear form on the box.
pub fn compute_min(row: &IntervalMatrix, output: &BoundsPair) -> Result<Interval> {
    signed_dot(row, output.lower(), output.upper())
}

/// Sound upper range of `row . y` over the output box.
///
/// Its `sup` is an upper bound of the linear form on the box.
pub fn compute_max(row: &IntervalMatrix, output: &BoundsPair) -> Result<Interval> {
    signed_dot(row, output.upper(), output.lower())
}

/// Three-valued verdict of one disjunct from the ends of its range.
///
/// A NaN end carries no information and gives `Maybe`.
pub fn classify(comparison: Comparison, min_inf: f64, max_sup: f64, epsilon: f64) -> Verdict {
    if min_inf.is_nan() || max_sup.is_nan() {
        return Verdict::Maybe;
    }
    match comparison {
        Comparison::NonStrict => {
            if min_inf > epsilon {
                Verdict::No
            } else if max_sup > epsilon {
                Verdict::Maybe
            } else {
                Verdict::Yes
            }
        }
        Comparison::Strict => {
            if min_inf >= epsilon {
                Verdict::No
            } else if max_sup < epsilon {
                Verdict::Yes
            } else {
                Verdict::Maybe
            }
        }
    }
}

/// Cheap check comparing the label's lower end against every other upper end.
///
/// Either certifies robustness or leaves the property unresolved, never
/// reports a counterexample. Not applicable to a single-logit network.
pub fn check_simple(output: &BoundsPair, label: usize) -> Result<RobustnessOutcome> {
    let outputs = output.dim();
    validate_label(outputs, label)?;
    if outputs == 1 {
        return Ok(RobustnessOutcome::Unresolved {
            undecided: vec![1 - label],
        });
    }

    let correct = output
        .lower()
        .get(label, 0)
        .map(Interval::inf)
        .ok_or(IotaError::InvalidLabel { label, outputs })?;
    let worst_other = max_upper_excluding(output.upper(), label);
    debug!(
        "Simple check: label lower {:e}, worst other upper {:e}",
        correct, worst_other
    );

    if worst_other < correct {
        return Ok(RobustnessOutcome::Robust);
    }
    let undecided = output
        .upper_ends()
        .into_iter()
        .enumerate()
        .filter(|&(i, sup)| i != label && sup >= correct)
        .map(|(i, _)| i)
        .collect();
    Ok(RobustnessOutcome::Unresolved { undecided })
}

/// Check every disjunct against the output box.
pub fn check_full(
    output: &BoundsPair,
    label: usize,
    epsilon: f64,
) -> Result<Vec<DisjunctVerdict>> {
    let disjunction = DisjunctionMatrix::new(output.dim(), label)?;
    let matrix = disjunction.matrix();
    let mut verdicts = Vec::with_capacity(disjunction.len());

    for (row_idx, &class) in disjunction.classes().iter().enumerate() {
        let row = matrix.row(row_idx).ok_or_else(|| {
            IotaError::shape_mismatch(
                "disjunction row",
                vec![disjunction.len()],
                vec![matrix.nrows()],
            )
        })?;
        let min_val = compute_min(&row, output)?;
        let max_val = compute_max(&row, output)?;
        let verdict = classify(
            disjunction.comparison(),
            min_val.inf(),
            max_val.sup(),
            epsilon,
        );
        debug!(
            "Disjunct class {}: range [{:e}, {:e}] -> {}",
            class,
            min_val.inf(),
            max_val.sup(),
            verdict
        );
        verdicts.push(DisjunctVerdict {
            class,
            verdict,
            lower: min_val.inf(),
            upper: max_val.sup(),
        });
    }
    Ok(verdicts)
}

/// Combine disjunct verdicts: any `Yes` is a counterexample, all `No` is robust.
pub fn aggregate(verdicts: &[DisjunctVerdict]) -> RobustnessOutcome {
    if let Some(hit) = verdicts.iter().find(|v| v.verdict == Verdict::Yes) {
        return RobustnessOutcome::NotRobust { class: hit.class };
    }
    let undecided: Vec<usize> = verdicts
        .iter()
        .filter(|v| v.verdict == Verdict::Maybe)
        .map(|v| v.class)
        .collect();
    if undecided.is_empty() {
        RobustnessOutcome::Robust
    } else {
        RobustnessOutcome::Unresolved { undecided }
    }
}
