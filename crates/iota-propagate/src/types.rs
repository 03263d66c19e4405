//! Configuration and property types for verification runs.

use iota_core::{IotaError, Precision, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which decision procedure the verifier applies to the output box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    /// Compare the label's lower end against the other upper ends.
    Simple,
    /// Check every disjunct of the negated property.
    Full,
    /// Simple first, then full if simple leaves the property unresolved.
    #[default]
    Auto,
}

impl std::str::FromStr for DecisionMode {
    type Err = IotaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(DecisionMode::Simple),
            "full" => Ok(DecisionMode::Full),
            "auto" => Ok(DecisionMode::Auto),
            other => Err(IotaError::InvalidSpec(format!(
                "unknown decision mode '{other}' (expected simple, full or auto)"
            ))),
        }
    }
}

/// Configuration for a verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Precision whose default tolerance applies when `tolerance` is unset.
    pub precision: Precision,
    /// Explicit numeric tolerance, overriding the precision default.
    pub tolerance: Option<f64>,
    pub mode: DecisionMode,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            precision: Precision::Single,
            tolerance: None,
            mode: DecisionMode::Auto,
        }
    }
}

impl VerifierConfig {
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_mode(mut self, mode: DecisionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Tolerance actually used to widen parameters and decide disjuncts.
    pub fn effective_tolerance(&self) -> f64 {
        self.tolerance
            .unwrap_or_else(|| self.precision.default_tolerance())
    }

    /// Reject tolerances that cannot widen an interval.
    pub fn validate(&self) -> Result<()> {
        let tol = self.effective_tolerance();
        if !tol.is_finite() || tol < 0.0 {
            return Err(IotaError::InvalidSpec(format!(
                "tolerance must be finite and non-negative, got {tol}"
            )));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            IotaError::InvalidSpec(format!(
                "invalid config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// A local robustness property: an input box and the expected class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessProperty {
    pub input_lower: Vec<f64>,
    pub input_upper: Vec<f64>,
    pub label: usize,
}

impl RobustnessProperty {
    pub fn new(input_lower: Vec<f64>, input_upper: Vec<f64>, label: usize) -> Self {
        Self {
            input_lower,
            input_upper,
            label,
        }
    }

    /// Number of input components.
    pub fn dim(&self) -> usize {
        self.input_lower.len()
    }
}
