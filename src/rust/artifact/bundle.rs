use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::manager::{sha256_file, ArtifactError};
use crate::classifier::{ClassPredictor, ClassifierInfo, ClassifierSpec};
use crate::error::PipelineError;
use crate::labels::LabelMap;
use crate::runtime::RuntimeConfig;
use crate::scaler::FittedScaler;
use crate::schema::FeatureSchema;

/// On-disk description of a model artifact: the classifier, the scaler it
/// was trained behind, and the label encoder's class order, versioned
/// together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub version: String,
    pub scaler: FittedScaler,
    pub classifier: ClassifierSpec,
    /// Label names indexed by class index
    pub classes: Vec<String>,
}

impl ArtifactManifest {
    pub fn from_json(text: &str) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Model file the manifest refers to, for backends that keep one
    pub fn model_file(&self) -> Option<(&str, Option<&str>)> {
        match &self.classifier {
            ClassifierSpec::Onnx(spec) => Some((spec.path.as_str(), spec.sha256.as_deref())),
            _ => None,
        }
    }
}

/// A loaded, validated artifact. Immutable and shared for the life of the
/// process.
#[derive(Debug)]
pub struct ModelArtifact {
    name: String,
    version: String,
    scaler: FittedScaler,
    classifier: Box<dyn ClassPredictor>,
    labels: LabelMap,
    source: Option<PathBuf>,
}

impl ModelArtifact {
    /// Assembles an artifact from already-built parts.
    ///
    /// Fails if the scaler is malformed or the classifier's recorded input
    /// width disagrees with the scaler.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        scaler: FittedScaler,
        classifier: Box<dyn ClassPredictor>,
        labels: LabelMap,
    ) -> Result<Self, PipelineError> {
        scaler.validate()?;
        if let Some(width) = classifier.n_features() {
            if width != scaler.n_features() {
                return Err(PipelineError::InvalidArtifact(format!(
                    "Classifier expects {} features but the scaler produces {}",
                    width,
                    scaler.n_features()
                )));
            }
        }
        let name = name.into();
        if let Some(n_classes) = classifier.n_classes() {
            if n_classes != labels.len() {
                warn!(
                    "Artifact '{}': classifier has {} classes but {} labels; unmatched indices resolve to Unknown",
                    name,
                    n_classes,
                    labels.len()
                );
            }
        }

        Ok(Self {
            name,
            version: version.into(),
            scaler,
            classifier,
            labels,
            source: None,
        })
    }

    pub fn from_manifest(
        manifest: ArtifactManifest,
        base_dir: &Path,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ArtifactError> {
        if let Some((path, Some(expected))) = manifest.model_file() {
            let model_path = base_dir.join(path);
            let actual = sha256_file(&model_path)?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ArtifactError::HashMismatch {
                    file_type: "model".to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let labels = LabelMap::from_classes(manifest.classes)?;
        let classifier = manifest.classifier.into_predictor(base_dir, runtime)?;
        Ok(Self::new(manifest.name, manifest.version, manifest.scaler, classifier, labels)?)
    }

    /// Reads a manifest file and loads everything it references.
    pub fn load<P: AsRef<Path>>(path: P, runtime: &RuntimeConfig) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!("Loading model artifact from {:?}", path);
        let manifest = ArtifactManifest::from_json(&fs::read_to_string(path)?)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut artifact = Self::from_manifest(manifest, base_dir, runtime)?;
        artifact.source = Some(path.to_path_buf());
        info!(
            "Artifact '{}' v{} ready: {} backend, {} features, {} labels",
            artifact.name,
            artifact.version,
            artifact.classifier.backend(),
            artifact.scaler.n_features(),
            artifact.labels.len()
        );
        Ok(artifact)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scaler(&self) -> &FittedScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &dyn ClassPredictor {
        self.classifier.as_ref()
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Manifest the artifact was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            backend: self.classifier.backend(),
            n_features: self.classifier.n_features(),
            n_classes: self.classifier.n_classes(),
            class_labels: self.labels.names().to_vec(),
        }
    }

    /// Startup check that a schema's numeric features are exactly the ones
    /// the scaler was fit with.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<(), PipelineError> {
        self.scaler.column_order(&schema.feature_names()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LinearModel;
    use crate::scaler::ScalerTransform;
    use crate::schema::{DENGUE_RISK, VITALS};

    fn manifest_json() -> String {
        r#"{
            "name": "stress-vitals",
            "version": "2",
            "scaler": {
                "feature_names": ["Temperature", "SpO2", "HeartRate", "SYS", "DIA"],
                "transform": {"kind": "identity"}
            },
            "classifier": {
                "kind": "linear",
                "coefficients": [[0, 0, 1, 0, 0], [0, 0, -1, 0, 0]],
                "intercepts": [-100, 100]
            },
            "classes": ["Cemas", "Tenang"]
        }"#
        .to_string()
    }

    #[test]
    fn test_from_manifest() {
        let manifest = ArtifactManifest::from_json(&manifest_json()).unwrap();
        assert!(manifest.model_file().is_none());
        let artifact = ModelArtifact::from_manifest(manifest, Path::new("."), &RuntimeConfig::default()).unwrap();
        assert_eq!(artifact.name(), "stress-vitals");
        assert_eq!(artifact.info().class_labels, vec!["Cemas", "Tenang"]);
        assert!(artifact.check_schema(&VITALS).is_ok());
        assert!(matches!(
            artifact.check_schema(&DENGUE_RISK),
            Err(PipelineError::FeatureOrderMismatch { .. })
        ));
    }

    #[test]
    fn test_width_disagreement_rejected() {
        let scaler = FittedScaler {
            feature_names: vec!["a".into(), "b".into()],
            transform: ScalerTransform::Identity,
        };
        let classifier = LinearModel::new(vec![vec![1.0, 2.0, 3.0]], vec![0.0]).unwrap();
        let labels = LabelMap::from_classes(vec!["x".into(), "y".into()]).unwrap();
        let result = ModelArtifact::new("bad", "1", scaler, Box::new(classifier), labels);
        assert!(matches!(result, Err(PipelineError::InvalidArtifact(_))));
    }

    #[test]
    fn test_manifest_round_trip() {
        let manifest = ArtifactManifest::from_json(&manifest_json()).unwrap();
        let again = ArtifactManifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(manifest, again);
    }
}
