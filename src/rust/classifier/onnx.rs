use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::check_width;
use super::{ClassIndex, ClassPredictor};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Manifest entry for a classifier exported to ONNX (e.g. with skl2onnx).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnnxModelSpec {
    /// Model file, relative to the manifest's directory
    pub path: String,
    /// Expected SHA-256 of the model file
    #[serde(default)]
    pub sha256: Option<String>,
    /// Name of the float feature input; defaults to the model's first input
    #[serde(default)]
    pub input_name: Option<String>,
    /// Name of the integer label output; defaults to the model's first output
    #[serde(default)]
    pub label_output: Option<String>,
    #[serde(default)]
    pub n_features: Option<usize>,
}

/// A classifier run through ONNX Runtime.
///
/// The model must take one `float32` tensor of shape `[batch, n_features]`
/// and emit an `int64` label tensor holding label-encoded class indices.
#[derive(Debug)]
pub struct OnnxClassifier {
    pub model_path: PathBuf,
    session: Session,
    input_name: String,
    label_output: String,
    n_features: Option<usize>,
}

impl OnnxClassifier {
    pub fn load(spec: &OnnxModelSpec, base_dir: &Path, config: &RuntimeConfig) -> Result<Self, ClassifierError> {
        let model_path = base_dir.join(&spec.path);
        if !model_path.exists() {
            return Err(ClassifierError::LoadError(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let session = create_session_builder(config)?.commit_from_file(&model_path)?;
        Self::validate_model(&session)?;

        let input_name = match &spec.input_name {
            Some(name) => name.clone(),
            None => session.inputs[0].name.clone(),
        };
        let label_output = match &spec.label_output {
            Some(name) => name.clone(),
            None => session.outputs[0].name.clone(),
        };
        if !session.outputs.iter().any(|o| o.name == label_output) {
            return Err(ClassifierError::ModelError(format!(
                "Model has no output named '{}'",
                label_output
            )));
        }

        info!(
            "Loaded ONNX classifier {:?} (input '{}', label output '{}')",
            model_path, input_name, label_output
        );

        Ok(Self {
            model_path,
            session,
            input_name,
            label_output,
            n_features: spec.n_features,
        })
    }

    /// Validates that the model has at least one input and one output
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.is_empty() {
            return Err(ClassifierError::ModelError("Model must have a feature input".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError("Model must have a label output".to_string()));
        }
        Ok(())
    }
}

impl ClassPredictor for OnnxClassifier {
    fn backend(&self) -> &'static str {
        "onnx"
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn n_classes(&self) -> Option<usize> {
        None
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<ClassIndex>, ClassifierError> {
        if let Some(expected) = self.n_features {
            check_width(&features, expected)?;
        }
        let (rows, cols) = features.dim();
        let array = Array2::from_shape_vec((rows, cols), features.iter().map(|&x| x as f32).collect())
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create input array: {}", e)))?;

        let input = Tensor::from_array(array)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?;
        let mut inputs = HashMap::new();
        inputs.insert(self.input_name.as_str(), input);

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let labels = outputs
            .get(self.label_output.as_str())
            .ok_or_else(|| ClassifierError::PredictionError(format!("Missing output '{}'", self.label_output)))?
            .try_extract_tensor::<i64>()
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to extract labels: {}", e)))?;

        let predictions: Vec<ClassIndex> = labels.iter().copied().collect();
        if predictions.len() != rows {
            return Err(ClassifierError::PredictionError(format!(
                "Model returned {} labels for {} rows",
                predictions.len(),
                rows
            )));
        }
        debug!("ONNX classifier labelled {} rows", rows);
        Ok(predictions)
    }
}
