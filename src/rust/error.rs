use thiserror::Error;

use crate::classifier::{ClassIndex, ClassifierError};
use crate::source::SourceError;

/// Errors surfaced by a pipeline cycle or by startup validation.
///
/// Only [`PipelineError::is_fatal`] errors should stop a long-running
/// process; everything else discards the current cycle and leaves the next
/// trigger free to start over.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column has no match among the raw headers after renaming.
    #[error("Missing required column(s): {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// The artifact's scaler was fit on a different feature set.
    #[error(
        "Feature order mismatch: artifact expects [{}], batch provides [{}]",
        .expected.join(", "),
        .found.join(", ")
    )]
    FeatureOrderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// No rows survived cleaning.
    #[error("No data available yet")]
    EmptyBatch,

    /// Per-row warning, never aborts a batch.
    #[error("Row {row}: classifier emitted unknown class index {index}")]
    UnknownLabelIndex { row: usize, index: ClassIndex },

    #[error("A refresh cycle is already in progress")]
    CycleInFlight,

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl PipelineError {
    /// Startup-time disagreements between schema and artifact. Running with
    /// them would silently misclassify every row.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FeatureOrderMismatch { .. } | Self::InvalidSchema(_) | Self::InvalidArtifact(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_names_columns() {
        let err = PipelineError::SchemaMismatch {
            missing: vec!["kecamatan".to_string(), "curah_hujan".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required column(s): kecamatan, curah_hujan");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatality() {
        assert!(PipelineError::FeatureOrderMismatch { expected: vec![], found: vec![] }.is_fatal());
        assert!(!PipelineError::EmptyBatch.is_fatal());
        assert!(!PipelineError::CycleInFlight.is_fatal());
        assert!(!PipelineError::UnknownLabelIndex { row: 0, index: 7 }.is_fatal());
    }
}
