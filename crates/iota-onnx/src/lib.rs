//! Model and property loading for iota.
//!
//! Models are single linear layers read from ONNX (`Gemm`, or `MatMul` +
//! `Add`) or from a small JSON format; both may be gzip-compressed.
//! Properties are read from VNNLIB files.

mod io;
pub mod json;
pub mod onnx;
pub mod vnnlib;

use iota_core::{IotaError, Result};
use iota_propagate::LinearLayer;
use ndarray::{Array1, Array2};
use std::path::Path;

pub use json::{load_json, parse_json_model, JsonModel};
pub use onnx::{decode_onnx, load_onnx, onnx_proto};
pub use vnnlib::{label_from_file_name, parse_vnnlib, read_vnnlib};

/// Supported on-disk model formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Onnx,
    Json,
}

impl ModelFormat {
    /// Detect the format from the file extension, ignoring a trailing `.gz`.
    pub fn from_path(path: &Path) -> Result<Self> {
        match io::logical_extension(path).as_deref() {
            Some("onnx") => Ok(ModelFormat::Onnx),
            Some("json") => Ok(ModelFormat::Json),
            other => Err(IotaError::ModelLoad(format!(
                "Unsupported model format {:?} for {} (expected .onnx or .json)",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}

/// Point-valued parameters of a linear classifier, `y = W x + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub name: String,
    /// `n x m`: one row per output.
    pub weight: Array2<f64>,
    /// Length `n`.
    pub bias: Array1<f64>,
}

impl LoadedModel {
    pub fn new(name: String, weight: Array2<f64>, bias: Array1<f64>) -> Self {
        Self { name, weight, bias }
    }

    pub fn input_dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// Build the interval layer, widening every parameter by `tolerance`.
    pub fn to_layer(&self, tolerance: f64) -> Result<LinearLayer> {
        LinearLayer::build(self.weight.clone(), self.bias.clone(), tolerance)
    }
}

/// Load a model, choosing the reader by file extension.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<LoadedModel> {
    let path = path.as_ref();
    match ModelFormat::from_path(path)? {
        ModelFormat::Onnx => load_onnx(path),
        ModelFormat::Json => load_json(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::tests::temp_file;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ModelFormat::from_path(Path::new("a.onnx")).unwrap(),
            ModelFormat::Onnx
        );
        assert_eq!(
            ModelFormat::from_path(Path::new("a.json.gz")).unwrap(),
            ModelFormat::Json
        );
        let err = ModelFormat::from_path(Path::new("a.pt")).unwrap_err();
        assert!(err.to_string().contains("Unsupported model format"), "{err}");
    }

    #[test]
    fn test_load_model_json_to_layer() {
        let file = temp_file(".json", br#"{"weight": [[1.0, -1.0]], "bias": [0.0]}"#);
        let model = load_model(file.path()).unwrap();
        assert_eq!(model.input_dim(), 2);
        assert_eq!(model.output_dim(), 1);

        let layer = model.to_layer(0.0).unwrap();
        assert_eq!(layer.weight_points(), &model.weight);
    }

    #[test]
    fn test_to_layer_rejects_bias_mismatch() {
        let model = LoadedModel::new(
            "bad".into(),
            Array2::zeros((2, 2)),
            Array1::zeros(3),
        );
        assert!(matches!(
            model.to_layer(0.0),
            Err(IotaError::ShapeMismatch { .. })
        ));
    }
}
