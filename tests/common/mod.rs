#![allow(dead_code)]

use std::sync::Arc;

use amygdala::{
    ClassIndex, ClassPredictor, ClassifierError, FittedScaler, LabelMap, LinearModel, ModelArtifact, Pipeline,
    ScalerTransform, DENGUE_RISK, VITALS,
};
use env_logger::{Builder, Env};
use ndarray::ArrayView2;

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

pub fn stress_labels() -> LabelMap {
    LabelMap::from_classes(vec!["Cemas".into(), "Rileks".into(), "Tegang".into(), "Tenang".into()]).unwrap()
}

pub fn identity_scaler(names: Vec<String>) -> FittedScaler {
    FittedScaler {
        feature_names: names,
        transform: ScalerTransform::Identity,
    }
}

/// Heart rate above 100 is Cemas, otherwise Tenang.
pub fn heart_rate_model() -> LinearModel {
    LinearModel::new(
        vec![
            vec![0.0, 0.0, 1.0, 0.0, 0.0],
            vec![0.0; 5],
            vec![0.0; 5],
            vec![0.0, 0.0, -1.0, 0.0, 0.0],
        ],
        vec![-100.0, -1000.0, -1000.0, 100.0],
    )
    .unwrap()
}

pub fn vitals_artifact() -> ModelArtifact {
    ModelArtifact::new(
        "stress-vitals",
        "1",
        identity_scaler(VITALS.feature_names()),
        Box::new(heart_rate_model()),
        stress_labels(),
    )
    .unwrap()
}

pub fn vitals_pipeline() -> Pipeline {
    Pipeline::new(VITALS.clone(), Arc::new(vitals_artifact())).unwrap()
}

/// Risk tier from case count alone: up to 10 Rendah, up to 30 Sedang, above that Tinggi.
pub fn dengue_pipeline() -> Pipeline {
    let mut coefficients = vec![vec![0.0; 9]; 3];
    coefficients[0][0] = -1.0;
    coefficients[2][0] = 1.0;
    let model = LinearModel::new(coefficients, vec![10.0, 0.0, -30.0]).unwrap();
    let labels = LabelMap::from_classes(vec!["Rendah".into(), "Sedang".into(), "Tinggi".into()]).unwrap();
    let artifact =
        ModelArtifact::new("dengue-risk", "1", identity_scaler(DENGUE_RISK.feature_names()), Box::new(model), labels)
            .unwrap();
    Pipeline::new(DENGUE_RISK.clone(), Arc::new(artifact)).unwrap()
}

/// Emits the same class index for every row.
#[derive(Debug)]
pub struct ConstantPredictor(pub ClassIndex);

impl ClassPredictor for ConstantPredictor {
    fn backend(&self) -> &'static str {
        "constant"
    }

    fn n_features(&self) -> Option<usize> {
        None
    }

    fn n_classes(&self) -> Option<usize> {
        None
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<ClassIndex>, ClassifierError> {
        Ok(vec![self.0; features.nrows()])
    }
}

pub const VITALS_HEADER: &str = "Suhu (°C),SpO2 (%),HeartRate (BPM),SYS,DIA";
