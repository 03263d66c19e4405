//! ONNX loading for single-layer linear classifiers.
//!
//! The graph must reduce to one affine map: either a single `Gemm`, or a
//! `MatMul` optionally followed by an `Add` with a constant bias. `Flatten`
//! and `Identity` nodes only reshape the input and are skipped.

use crate::io;
use crate::LoadedModel;
use iota_core::{IotaError, Result};
use ndarray::{Array1, Array2};
use prost::Message;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// ONNX tensor element types we read weights from.
const DATA_TYPE_FLOAT: i32 = 1;
const DATA_TYPE_DOUBLE: i32 = 11;

/// Ops that pass the input through unchanged for a flat input vector.
const PASS_THROUGH_OPS: &[&str] = &["Flatten", "Identity"];

/// Load an ONNX model (`.onnx` or `.onnx.gz`).
pub fn load_onnx<P: AsRef<Path>>(path: P) -> Result<LoadedModel> {
    let path = path.as_ref();
    info!("Loading ONNX model from: {}", path.display());
    let data = io::read_bytes(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model")
        .trim_end_matches(".onnx")
        .to_string();
    decode_onnx(&data, name)
}

/// Decode ONNX protobuf bytes into a linear model.
pub fn decode_onnx(data: &[u8], name: String) -> Result<LoadedModel> {
    let model = onnx_proto::ModelProto::decode(data)
        .map_err(|e| IotaError::ModelLoad(format!("Failed to parse ONNX: {e}")))?;
    let graph = model
        .graph
        .ok_or_else(|| IotaError::ModelLoad("Model has no graph".to_string()))?;

    let initializers: HashMap<&str, &onnx_proto::TensorProto> = graph
        .initializer
        .iter()
        .map(|t| (t.name.as_str(), t))
        .collect();
    debug!(
        "ONNX graph '{}': {} nodes, {} initializers",
        graph.name,
        graph.node.len(),
        initializers.len()
    );

    let mut linear_nodes = Vec::new();
    for node in &graph.node {
        match node.op_type.as_str() {
            "Gemm" | "MatMul" | "Add" => linear_nodes.push(node),
            op if PASS_THROUGH_OPS.contains(&op) => {
                debug!("Skipping {} node '{}'", op, node.name);
            }
            other => {
                return Err(IotaError::UnsupportedTopology(format!(
                    "operator {other} (node '{}') is not a single linear layer",
                    node.name
                )));
            }
        }
    }

    let (weight, bias) = match linear_nodes.as_slice() {
        [gemm] if gemm.op_type == "Gemm" => extract_gemm(gemm, &initializers)?,
        [matmul] if matmul.op_type == "MatMul" => {
            let weight = extract_matmul(matmul, &initializers)?;
            let bias = Array1::zeros(weight.nrows());
            (weight, bias)
        }
        [matmul, add] if matmul.op_type == "MatMul" && add.op_type == "Add" => {
            let weight = extract_matmul(matmul, &initializers)?;
            let bias = extract_add_bias(matmul, add, &initializers, weight.nrows())?;
            (weight, bias)
        }
        [] => {
            return Err(IotaError::UnsupportedTopology(
                "graph contains no linear layer".to_string(),
            ))
        }
        nodes => {
            let ops: Vec<&str> = nodes.iter().map(|n| n.op_type.as_str()).collect();
            return Err(IotaError::UnsupportedTopology(format!(
                "expected one Gemm or MatMul+Add, found {ops:?}"
            )));
        }
    };

    info!(
        "Loaded linear layer: {} outputs, {} inputs",
        weight.nrows(),
        weight.ncols()
    );
    Ok(LoadedModel::new(name, weight, bias))
}

fn initializer<'a>(
    initializers: &HashMap<&str, &'a onnx_proto::TensorProto>,
    name: &str,
) -> Option<&'a onnx_proto::TensorProto> {
    initializers.get(name).copied()
}

fn attr_int(node: &onnx_proto::NodeProto, name: &str, default: i64) -> i64 {
    node.attribute
        .iter()
        .find(|a| a.name == name)
        .map_or(default, |a| a.i)
}

fn attr_float(node: &onnx_proto::NodeProto, name: &str, default: f32) -> f32 {
    node.attribute
        .iter()
        .find(|a| a.name == name)
        .map_or(default, |a| a.f)
}

/// `Y = alpha * A * op(B) + beta * C` with `A` the input row vector.
fn extract_gemm(
    node: &onnx_proto::NodeProto,
    initializers: &HashMap<&str, &onnx_proto::TensorProto>,
) -> Result<(Array2<f64>, Array1<f64>)> {
    if attr_int(node, "transA", 0) != 0 {
        return Err(IotaError::UnsupportedTopology(
            "Gemm with transA=1 does not act on the input vector".to_string(),
        ));
    }
    let b_name = node
        .input
        .get(1)
        .ok_or_else(|| IotaError::ModelLoad("Gemm node is missing its B input".to_string()))?;
    let b = initializer(initializers, b_name).ok_or_else(|| {
        IotaError::ModelLoad(format!("Gemm weight '{b_name}' is not an initializer"))
    })?;
    let b = tensor_to_matrix(b)?;

    // op(B) is m x n; the layer weight is its transpose, n x m.
    let mut weight = if attr_int(node, "transB", 0) != 0 {
        b
    } else {
        b.reversed_axes()
    };
    let alpha = f64::from(attr_float(node, "alpha", 1.0));
    let beta = f64::from(attr_float(node, "beta", 1.0));
    weight.mapv_inplace(|w| alpha * w);

    let n = weight.nrows();
    let bias = match node.input.get(2).filter(|s| !s.is_empty()) {
        Some(c_name) => {
            let c = initializer(initializers, c_name).ok_or_else(|| {
                IotaError::ModelLoad(format!("Gemm bias '{c_name}' is not an initializer"))
            })?;
            tensor_to_vector(c, n)? * beta
        }
        None => Array1::zeros(n),
    };
    debug!(
        "Gemm '{}': transB={}, alpha={}, beta={}",
        node.name,
        attr_int(node, "transB", 0),
        alpha,
        beta
    );
    Ok((weight, bias))
}

/// Weight of `MatMul(x, B)` (transposed) or `MatMul(B, x)`.
fn extract_matmul(
    node: &onnx_proto::NodeProto,
    initializers: &HashMap<&str, &onnx_proto::TensorProto>,
) -> Result<Array2<f64>> {
    let [lhs, rhs] = node.input.as_slice() else {
        return Err(IotaError::ModelLoad(format!(
            "MatMul node '{}' needs two inputs",
            node.name
        )));
    };
    match (initializer(initializers, lhs), initializer(initializers, rhs)) {
        (None, Some(b)) => Ok(tensor_to_matrix(b)?.reversed_axes()),
        (Some(a), None) => tensor_to_matrix(a),
        (Some(_), Some(_)) => Err(IotaError::UnsupportedTopology(
            "MatMul of two constants does not depend on the input".to_string(),
        )),
        (None, None) => Err(IotaError::ModelLoad(format!(
            "MatMul node '{}' has no constant weight",
            node.name
        ))),
    }
}

fn extract_add_bias(
    matmul: &onnx_proto::NodeProto,
    add: &onnx_proto::NodeProto,
    initializers: &HashMap<&str, &onnx_proto::TensorProto>,
    n: usize,
) -> Result<Array1<f64>> {
    let matmul_out = matmul
        .output
        .first()
        .ok_or_else(|| IotaError::ModelLoad("MatMul node has no output".to_string()))?;
    let bias_name = match add.input.as_slice() {
        [a, b] if a == matmul_out => b,
        [a, b] if b == matmul_out => a,
        _ => {
            return Err(IotaError::UnsupportedTopology(format!(
                "Add node '{}' does not consume the MatMul output",
                add.name
            )))
        }
    };
    let bias = initializer(initializers, bias_name).ok_or_else(|| {
        IotaError::ModelLoad(format!("Add bias '{bias_name}' is not an initializer"))
    })?;
    tensor_to_vector(bias, n)
}

fn tensor_values(tensor: &onnx_proto::TensorProto) -> Result<Vec<f64>> {
    match tensor.data_type {
        DATA_TYPE_FLOAT if !tensor.raw_data.is_empty() => {
            decode_raw::<4>(tensor, |b| f64::from(f32::from_le_bytes(b)))
        }
        DATA_TYPE_FLOAT => Ok(tensor.float_data.iter().map(|&v| f64::from(v)).collect()),
        DATA_TYPE_DOUBLE if !tensor.raw_data.is_empty() => {
            decode_raw::<8>(tensor, f64::from_le_bytes)
        }
        DATA_TYPE_DOUBLE => Ok(tensor.double_data.clone()),
        other => Err(IotaError::ModelLoad(format!(
            "Tensor '{}' has unsupported data type {other} (expected FLOAT or DOUBLE)",
            tensor.name
        ))),
    }
}

fn decode_raw<const N: usize>(
    tensor: &onnx_proto::TensorProto,
    convert: impl Fn([u8; N]) -> f64,
) -> Result<Vec<f64>> {
    let chunks = tensor.raw_data.chunks_exact(N);
    if !chunks.remainder().is_empty() {
        return Err(IotaError::ModelLoad(format!(
            "Tensor '{}' raw data length {} is not a multiple of {N}",
            tensor.name,
            tensor.raw_data.len()
        )));
    }
    Ok(chunks
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            convert(bytes)
        })
        .collect())
}

fn tensor_dims(tensor: &onnx_proto::TensorProto) -> Result<Vec<usize>> {
    tensor
        .dims
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| {
                IotaError::ModelLoad(format!("Tensor '{}' has negative dim {d}", tensor.name))
            })
        })
        .collect()
}

fn tensor_to_matrix(tensor: &onnx_proto::TensorProto) -> Result<Array2<f64>> {
    let dims = tensor_dims(tensor)?;
    let [rows, cols] = dims.as_slice() else {
        return Err(IotaError::UnsupportedTopology(format!(
            "weight '{}' has shape {dims:?}, expected a matrix",
            tensor.name
        )));
    };
    Array2::from_shape_vec((*rows, *cols), tensor_values(tensor)?).map_err(|e| {
        IotaError::ModelLoad(format!("Tensor '{}' data does not match shape: {e}", tensor.name))
    })
}

/// Read a bias of length `n`, accepting shapes `[n]`, `[1, n]` and `[n, 1]`.
fn tensor_to_vector(tensor: &onnx_proto::TensorProto, n: usize) -> Result<Array1<f64>> {
    let dims = tensor_dims(tensor)?;
    let values = tensor_values(tensor)?;
    let len: usize = dims.iter().product();
    if values.len() != len {
        return Err(IotaError::ModelLoad(format!(
            "Tensor '{}' has {} values for shape {dims:?}",
            tensor.name,
            values.len()
        )));
    }
    let flat_ok = match dims.as_slice() {
        [d] => *d == n,
        [1, d] | [d, 1] => *d == n,
        [] => n == 1,
        _ => false,
    };
    if !flat_ok {
        return Err(IotaError::shape_mismatch("onnx bias", vec![n], dims));
    }
    Ok(Array1::from_vec(values))
}

/// Minimal subset of the ONNX protobuf schema.
pub mod onnx_proto {
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct ModelProto {
        #[prost(int64, tag = "1")]
        pub ir_version: i64,
        #[prost(message, repeated, tag = "8")]
        pub opset_import: Vec<OperatorSetIdProto>,
        #[prost(string, tag = "2")]
        pub producer_name: String,
        #[prost(message, optional, tag = "7")]
        pub graph: Option<GraphProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct OperatorSetIdProto {
        #[prost(string, tag = "1")]
        pub domain: String,
        #[prost(int64, tag = "2")]
        pub version: i64,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct GraphProto {
        #[prost(message, repeated, tag = "1")]
        pub node: Vec<NodeProto>,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(message, repeated, tag = "5")]
        pub initializer: Vec<TensorProto>,
        #[prost(message, repeated, tag = "11")]
        pub input: Vec<ValueInfoProto>,
        #[prost(message, repeated, tag = "12")]
        pub output: Vec<ValueInfoProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct NodeProto {
        #[prost(string, repeated, tag = "1")]
        pub input: Vec<String>,
        #[prost(string, repeated, tag = "2")]
        pub output: Vec<String>,
        #[prost(string, tag = "3")]
        pub name: String,
        #[prost(string, tag = "4")]
        pub op_type: String,
        #[prost(message, repeated, tag = "5")]
        pub attribute: Vec<AttributeProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct TensorProto {
        #[prost(int64, repeated, tag = "1")]
        pub dims: Vec<i64>,
        #[prost(int32, tag = "2")]
        pub data_type: i32,
        #[prost(float, repeated, tag = "4")]
        pub float_data: Vec<f32>,
        #[prost(string, tag = "8")]
        pub name: String,
        #[prost(bytes = "vec", tag = "9")]
        pub raw_data: Vec<u8>,
        #[prost(double, repeated, tag = "10")]
        pub double_data: Vec<f64>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct ValueInfoProto {
        #[prost(string, tag = "1")]
        pub name: String,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct AttributeProto {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(float, tag = "2")]
        pub f: f32,
        #[prost(int64, tag = "3")]
        pub i: i64,
        #[prost(int32, tag = "20")]
        pub r#type: i32,
    }
}
