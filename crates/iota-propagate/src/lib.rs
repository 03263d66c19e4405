//! Sound interval bound propagation and robustness decisions.
//!
//! A [`LinearLayer`] holds interval-valued parameters. Propagating an input
//! [`BoundsPair`] through it gives an output box that encloses every true
//! output, and the [`decision`] procedures turn that box into a
//! [`RobustnessOutcome`](iota_core::RobustnessOutcome). The [`Verifier`] ties
//! both together under a [`VerifierConfig`].

pub mod bounds;
pub mod decision;
pub mod layers;
pub mod refine;
pub mod types;
pub mod verifier;

pub use bounds::BoundsPair;
pub use decision::{
    aggregate, check_full, check_simple, classify, compute_max, compute_min,
    create_disjunction_matrix, validate_label, Comparison, DisjunctVerdict, DisjunctionMatrix,
};
pub use layers::{Layer, LinearLayer};
pub use refine::{NoRefinement, Refiner};
pub use types::{DecisionMode, RobustnessProperty, VerifierConfig};
pub use verifier::{DecidedBy, VerificationReport, Verifier};

/// Propagate an input box through a layer.
pub fn propagate(layer: &dyn Layer, input: &BoundsPair) -> iota_core::Result<BoundsPair> {
    layer.propagate(input)
}

#[cfg(test)]
mod tests;
