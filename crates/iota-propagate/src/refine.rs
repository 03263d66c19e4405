//! Extension point for resolving inconclusive verdicts.

use crate::bounds::BoundsPair;
use crate::decision::DisjunctVerdict;
use crate::layers::LinearLayer;
use iota_core::RobustnessOutcome;

/// Second-stage procedure consulted when interval bounds leave a property
/// unresolved.
///
/// `verdicts` is empty when only the simple check ran. Implementations must
/// stay sound: returning [`RobustnessOutcome::Robust`] requires a proof that
/// every input in `input` is classified as `label`.
pub trait Refiner: Send + Sync {
    fn refine(
        &self,
        layer: &LinearLayer,
        input: &BoundsPair,
        label: usize,
        verdicts: &[DisjunctVerdict],
        outcome: RobustnessOutcome,
    ) -> RobustnessOutcome;

    /// Short name for logs and reports.
    fn name(&self) -> &'static str {
        "refiner"
    }
}

/// Leaves unresolved outcomes unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefinement;

impl Refiner for NoRefinement {
    fn refine(
        &self,
        _layer: &LinearLayer,
        _input: &BoundsPair,
        _label: usize,
        _verdicts: &[DisjunctVerdict],
        outcome: RobustnessOutcome,
    ) -> RobustnessOutcome {
        outcome
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
