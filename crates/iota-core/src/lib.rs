//! Core types for iota interval robustness certification.
//!
//! This crate holds the vocabulary shared by the kernel, the loaders and the
//! command-line front end: the error type, the three-valued disjunct verdict,
//! the aggregate robustness outcome and the numeric precision setting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Working precision of a verification run.
///
/// The precision only selects the default numeric tolerance used to widen
/// point-valued parameters into intervals; arithmetic is always done in `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit floating point (tolerance `1e-6`).
    #[default]
    Single,
    /// 64-bit floating point (tolerance `1e-12`).
    Double,
}

impl Precision {
    /// Default tolerance for this precision.
    #[inline]
    pub fn default_tolerance(self) -> f64 {
        match self {
            Precision::Single => 1e-6,
            Precision::Double => 1e-12,
        }
    }

    /// Parse a precision from a bit count (`32` or `64`).
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            32 => Ok(Precision::Single),
            64 => Ok(Precision::Double),
            other => Err(IotaError::InvalidSpec(format!(
                "unsupported precision: {other} bits (expected 32 or 64)"
            ))),
        }
    }

    /// Bit width of this precision.
    pub fn bits(self) -> u32 {
        match self {
            Precision::Single => 32,
            Precision::Double => 64,
        }
    }
}

/// What sound interval bounds can certify about a single disjunct.
///
/// A disjunct is one linear inequality of the negated robustness property
/// ("class `i` is at least as large as the label class").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Every point of the box satisfies the disjunct: a counterexample is certain.
    Yes,
    /// No point of the box satisfies the disjunct.
    No,
    /// The bounds are too loose to decide.
    Maybe,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Yes => write!(f, "yes"),
            Verdict::No => write!(f, "no"),
            Verdict::Maybe => write!(f, "maybe"),
        }
    }
}

/// Aggregate result of a robustness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RobustnessOutcome {
    /// Every point of the input box is classified as the label.
    Robust,
    /// Some competing class reaches the label's score on the whole box, up
    /// to the tolerance: a margin of at most the tolerance counts as reached.
    NotRobust {
        /// Index of the class whose disjunct was certainly satisfied.
        class: usize,
    },
    /// Neither robustness nor a counterexample could be certified.
    Unresolved {
        /// Classes whose disjunct verdict was `Maybe`.
        undecided: Vec<usize>,
    },
}

impl RobustnessOutcome {
    /// True only for a certified robust outcome.
    #[inline]
    pub fn is_robust(&self) -> bool {
        matches!(self, RobustnessOutcome::Robust)
    }

    /// True if the outcome is definite (robust or not robust).
    #[inline]
    pub fn is_decided(&self) -> bool {
        !matches!(self, RobustnessOutcome::Unresolved { .. })
    }
}

impl fmt::Display for RobustnessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobustnessOutcome::Robust => write!(f, "robust"),
            RobustnessOutcome::NotRobust { class } => {
                write!(f, "not robust (class {class} dominates)")
            }
            RobustnessOutcome::Unresolved { undecided } => {
                write!(f, "unresolved (undecided classes: {undecided:?})")
            }
        }
    }
}

/// Error types for iota operations.
#[derive(Debug, thiserror::Error)]
pub enum IotaError {
    #[error("Shape mismatch in {op}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid box at index {index}: lower {lower} exceeds upper {upper}")]
    InvalidBox { index: usize, lower: f64, upper: f64 },

    #[error("Unsupported topology: {0}")]
    UnsupportedTopology(String),

    #[error("Invalid label {label} for a network with {outputs} output(s)")]
    InvalidLabel { label: usize, outputs: usize },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IotaError {
    /// Create a `ShapeMismatch` error.
    ///
    /// Identical shapes indicate a bug in the caller, caught in debug builds.
    #[track_caller]
    pub fn shape_mismatch(op: &'static str, expected: Vec<usize>, got: Vec<usize>) -> Self {
        debug_assert!(
            expected != got,
            "BUG: ShapeMismatch in {op} with identical shapes {expected:?} at {}",
            std::panic::Location::caller()
        );
        IotaError::ShapeMismatch { op, expected, got }
    }
}

pub type Result<T> = std::result::Result<T, IotaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_tolerances() {
        assert_eq!(Precision::Single.default_tolerance(), 1e-6);
        assert_eq!(Precision::Double.default_tolerance(), 1e-12);
        assert_eq!(Precision::default(), Precision::Single);
    }

    #[test]
    fn test_precision_from_bits() {
        assert_eq!(Precision::from_bits(32).unwrap(), Precision::Single);
        assert_eq!(Precision::from_bits(64).unwrap(), Precision::Double);
        assert_eq!(Precision::Double.bits(), 64);

        let err = Precision::from_bits(16).unwrap_err().to_string();
        assert!(err.contains("16 bits"), "{err}");
    }

    #[test]
    fn test_outcome_is_robust_all_variants() {
        assert!(RobustnessOutcome::Robust.is_robust());
        assert!(!RobustnessOutcome::NotRobust { class: 2 }.is_robust());
        assert!(!RobustnessOutcome::Unresolved { undecided: vec![1] }.is_robust());
    }

    #[test]
    fn test_outcome_is_decided() {
        assert!(RobustnessOutcome::Robust.is_decided());
        assert!(RobustnessOutcome::NotRobust { class: 0 }.is_decided());
        assert!(!RobustnessOutcome::Unresolved { undecided: vec![] }.is_decided());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RobustnessOutcome::Robust.to_string(), "robust");
        assert!(RobustnessOutcome::NotRobust { class: 3 }
            .to_string()
            .contains("class 3"));
        assert!(RobustnessOutcome::Unresolved { undecided: vec![1, 4] }
            .to_string()
            .contains("[1, 4]"));
    }

    #[test]
    fn test_outcome_serde_tagging() {
        let json = serde_json::to_string(&RobustnessOutcome::NotRobust { class: 1 }).unwrap();
        assert_eq!(json, r#"{"status":"not_robust","class":1}"#);

        let back: RobustnessOutcome = serde_json::from_str(r#"{"status":"robust"}"#).unwrap();
        assert_eq!(back, RobustnessOutcome::Robust);
    }

    #[test]
    fn test_error_messages() {
        let err = IotaError::shape_mismatch("matmul", vec![3], vec![2]);
        assert_eq!(
            err.to_string(),
            "Shape mismatch in matmul: expected [3], got [2]"
        );

        let err = IotaError::InvalidBox {
            index: 1,
            lower: 2.0,
            upper: 1.0,
        };
        assert!(err.to_string().contains("index 1"));

        let err = IotaError::InvalidLabel {
            label: 5,
            outputs: 3,
        };
        assert!(err.to_string().contains("label 5"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: IotaError = io.into();
        assert!(matches!(err, IotaError::Io(_)));
        assert_eq!(err.to_string(), "gone");
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Yes.to_string(), "yes");
        assert_eq!(Verdict::No.to_string(), "no");
        assert_eq!(Verdict::Maybe.to_string(), "maybe");
    }
}
