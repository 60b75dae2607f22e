use std::fmt;
use std::path::Path;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

mod error;
mod forest;
mod linear;
mod onnx;
mod utils;

pub use error::ClassifierError;
pub use forest::{DecisionTree, TreeEnsemble};
pub use linear::LinearModel;
pub use onnx::{OnnxClassifier, OnnxModelSpec};

use crate::runtime::RuntimeConfig;

/// Integer class index as emitted by a classifier. Signed so that any value
/// a backend produces can be carried to the label resolver.
pub type ClassIndex = i64;

/// A pre-fit multi-class classifier.
///
/// Implementations must be shareable across threads: an artifact is loaded
/// once and read by every cycle for the life of the process.
pub trait ClassPredictor: fmt::Debug + Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Number of input columns, when the model records it
    fn n_features(&self) -> Option<usize>;

    /// Size of the class-index range, when the model records it
    fn n_classes(&self) -> Option<usize>;

    /// One class index per row of `features`. Single-row and multi-row
    /// matrices are handled the same way.
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<ClassIndex>, ClassifierError>;
}

/// The classifier section of an artifact manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
    Onnx(OnnxModelSpec),
}

impl ClassifierSpec {
    /// Validates the parameters and produces a ready predictor. ONNX model
    /// paths resolve against `base_dir`.
    pub fn into_predictor(
        self,
        base_dir: &Path,
        runtime: &RuntimeConfig,
    ) -> Result<Box<dyn ClassPredictor>, ClassifierError> {
        match self {
            Self::Linear(model) => {
                model.validate()?;
                Ok(Box::new(model))
            }
            Self::TreeEnsemble(model) => {
                model.validate()?;
                Ok(Box::new(model))
            }
            Self::Onnx(spec) => Ok(Box::new(OnnxClassifier::load(&spec, base_dir, runtime)?)),
        }
    }
}

/// Information about a loaded classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInfo {
    /// Backend name (`linear`, `tree_ensemble`, `onnx`)
    pub backend: &'static str,
    /// Number of input features, if known
    pub n_features: Option<usize>,
    /// Number of classes the classifier can emit, if known
    pub n_classes: Option<usize>,
    /// Labels of the classes, in class-index order
    pub class_labels: Vec<String>,
}
