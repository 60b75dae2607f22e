use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur in a classifier backend.
#[derive(Debug)]
pub enum ClassifierError {
    /// Error occurred while loading the persisted model
    LoadError(String),
    /// Error occurred inside the ONNX runtime
    ModelError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input or model parameters
    ValidationError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadError(msg) => write!(f, "Load error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}
