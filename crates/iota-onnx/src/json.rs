//! Plain JSON model format: `{"weight": [[...], ...], "bias": [...]}`.

use crate::io;
use crate::LoadedModel;
use iota_core::{IotaError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// On-disk layout of a JSON model. `weight` is row-major, one row per output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonModel {
    #[serde(default)]
    pub name: Option<String>,
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl JsonModel {
    pub fn into_loaded(self, fallback_name: &str) -> Result<LoadedModel> {
        let n = self.weight.len();
        let m = self.weight.first().map_or(0, Vec::len);
        if let Some((row, bad)) = self
            .weight
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != m)
        {
            return Err(IotaError::InvalidModel(format!(
                "weight row {row} has {} entries, expected {m}",
                bad.len()
            )));
        }
        let flat: Vec<f64> = self.weight.into_iter().flatten().collect();
        let weight = Array2::from_shape_vec((n, m), flat)
            .map_err(|e| IotaError::InvalidModel(e.to_string()))?;
        let name = self.name.unwrap_or_else(|| fallback_name.to_string());
        Ok(LoadedModel::new(name, weight, Array1::from_vec(self.bias)))
    }
}

/// Parse a JSON model from text.
pub fn parse_json_model(text: &str, fallback_name: &str) -> Result<LoadedModel> {
    let model: JsonModel = serde_json::from_str(text)
        .map_err(|e| IotaError::ModelLoad(format!("Failed to parse JSON model: {e}")))?;
    model.into_loaded(fallback_name)
}

/// Load a JSON model (`.json` or `.json.gz`).
pub fn load_json<P: AsRef<Path>>(path: P) -> Result<LoadedModel> {
    let path = path.as_ref();
    info!("Loading JSON model from: {}", path.display());
    let text = io::read_text(path)?;
    let stem = io::logical_file_name(path)
        .and_then(|f| f.strip_suffix(".json"))
        .unwrap_or("model");
    parse_json_model(&text, stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::tests::{gzip, temp_file};
    use ndarray::{arr1, arr2};

    const DIFFERENCE: &str = r#"{"weight": [[1.0, -1.0]], "bias": [0.0]}"#;

    #[test]
    fn test_parse_json_model() {
        let m = parse_json_model(DIFFERENCE, "diff").unwrap();
        assert_eq!(m.name, "diff");
        assert_eq!(m.weight, arr2(&[[1.0, -1.0]]));
        assert_eq!(m.bias, arr1(&[0.0]));
    }

    #[test]
    fn test_named_model() {
        let m = parse_json_model(
            r#"{"name": "clf", "weight": [[1], [2]], "bias": [0, 1]}"#,
            "ignored",
        )
        .unwrap();
        assert_eq!(m.name, "clf");
        assert_eq!(m.weight.dim(), (2, 1));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = parse_json_model(r#"{"weight": [[1, 2], [3]], "bias": [0, 0]}"#, "x")
            .unwrap_err();
        assert!(matches!(err, IotaError::InvalidModel(_)), "{err}");
    }

    #[test]
    fn test_missing_field_rejected() {
        let err = parse_json_model(r#"{"weight": [[1]]}"#, "x").unwrap_err();
        assert!(err.to_string().contains("bias"), "{err}");
    }

    #[test]
    fn test_load_json_gzip() {
        let file = temp_file(".json.gz", &gzip(DIFFERENCE.as_bytes()));
        let m = load_json(file.path()).unwrap();
        assert_eq!(m.weight, arr2(&[[1.0, -1.0]]));
        assert!(!m.name.ends_with(".json"));
    }
}
