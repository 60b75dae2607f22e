//! A refresh-cycle inference pipeline for tabular sensor and survey data.
//!
//! Each cycle takes a raw batch, normalizes it against a [`FeatureSchema`],
//! rescales it with the artifact's fitted scaler, classifies every row and
//! resolves class indices into labels.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use amygdala::{
//!     FittedScaler, LabelMap, LinearModel, ModelArtifact, Pipeline, RawBatch, ScalerTransform, VITALS,
//! };
//! use std::sync::Arc;
//!
//! let scaler = FittedScaler {
//!     feature_names: VITALS.feature_names(),
//!     transform: ScalerTransform::Identity,
//! };
//! // Binary model on heart rate: above 100 is class 1
//! let model = LinearModel::new(vec![vec![0.0, 0.0, 1.0, 0.0, 0.0]], vec![-100.0])?;
//! let labels = LabelMap::from_classes(vec!["Tenang".into(), "Cemas".into()])?;
//! let artifact = ModelArtifact::new("demo", "1", scaler, Box::new(model), labels)?;
//!
//! let pipeline = Pipeline::new(VITALS.clone(), Arc::new(artifact))?;
//! let raw = RawBatch::from_csv_str("Suhu (°C),SpO2 (%),HeartRate (BPM),SYS,DIA\n\"36,5\",98,90,120,80\n")?;
//! let report = pipeline.run_cycle(&raw)?;
//! assert_eq!(report.latest().map(|r| r.label.name()), Some("Tenang"));
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A [`Pipeline`] is `Send + Sync` and meant to be shared through `Arc`.
//! Cycles never overlap: a call made while another is running fails with
//! [`PipelineError::CycleInFlight`].

pub mod artifact;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod labels;
pub mod monitor;
pub mod normalizer;
pub mod pipeline;
pub mod presentation;
pub mod runtime;
pub mod scaler;
pub mod schema;
pub mod session;
pub mod source;

pub use artifact::{ArtifactError, ArtifactManager, ArtifactManifest, ArtifactSource, ModelArtifact};
pub use cache::SourceCache;
pub use classifier::{
    ClassIndex, ClassPredictor, ClassifierError, ClassifierInfo, ClassifierSpec, LinearModel, TreeEnsemble,
};
pub use config::AppConfig;
pub use error::PipelineError;
pub use frame::RawBatch;
pub use labels::{resolve, DisplayNames, Label, LabelMap, UNKNOWN_LABEL};
pub use monitor::Monitor;
pub use normalizer::{normalize, CleanBatch, CleanRecord};
pub use pipeline::{CycleReport, LabeledRecord, Pipeline, PipelineState};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use scaler::{scale, FittedScaler, ScalerTransform};
pub use schema::{FeatureSchema, FeatureSlot, SlotKind, DENGUE_RISK, VITALS};
pub use session::SessionContext;
pub use source::{DataSource, SourceError};

pub fn init_logger() {
    env_logger::init();
}
