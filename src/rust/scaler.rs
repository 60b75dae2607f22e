use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::normalizer::CleanBatch;

/// Per-column transform parameters of a pre-fit scaler.
///
/// Parameter vectors are indexed by the scaler's own `feature_names`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerTransform {
    /// Features go to the classifier unchanged, e.g. when the exported
    /// model already contains its own scaling step.
    Identity,
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`, the scikit-learn `MinMaxScaler` parameterisation
    MinMax { min: Vec<f64>, scale: Vec<f64> },
    /// `(x - center) / scale`
    Robust { center: Vec<f64>, scale: Vec<f64> },
}

/// A scaler as persisted in the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    /// Column order the scaler was fit with
    pub feature_names: Vec<String>,
    pub transform: ScalerTransform,
}

impl FittedScaler {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Checks parameter lengths and values. Called when an artifact loads.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let n = self.n_features();
        if n == 0 {
            return Err(PipelineError::InvalidArtifact("Scaler has no feature names".into()));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.feature_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(PipelineError::InvalidArtifact(format!(
                "Scaler feature '{}' appears twice",
                dup
            )));
        }

        let (offsets, scales, divides) = match &self.transform {
            ScalerTransform::Identity => return Ok(()),
            ScalerTransform::Standard { mean, scale } => (mean, scale, true),
            ScalerTransform::MinMax { min, scale } => (min, scale, false),
            ScalerTransform::Robust { center, scale } => (center, scale, true),
        };
        if offsets.len() != n || scales.len() != n {
            return Err(PipelineError::InvalidArtifact(format!(
                "Scaler parameters have lengths {}/{} but {} features are named",
                offsets.len(),
                scales.len(),
                n
            )));
        }
        if offsets.iter().chain(scales.iter()).any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidArtifact("Scaler parameters must be finite".into()));
        }
        if divides && scales.iter().any(|&s| s == 0.0) {
            return Err(PipelineError::InvalidArtifact("Scaler scale cannot be zero".into()));
        }
        Ok(())
    }

    /// For each scaler column, the index of the same-named column in
    /// `found`. Fails unless the two name sets match one to one.
    pub fn column_order(&self, found: &[String]) -> Result<Vec<usize>, PipelineError> {
        let mismatch = || PipelineError::FeatureOrderMismatch {
            expected: self.feature_names.clone(),
            found: found.to_vec(),
        };
        if found.len() != self.feature_names.len() {
            return Err(mismatch());
        }

        let mut used = vec![false; found.len()];
        let mut order = Vec::with_capacity(found.len());
        for name in &self.feature_names {
            let idx = found
                .iter()
                .enumerate()
                .position(|(i, f)| !used[i] && f == name)
                .ok_or_else(mismatch)?;
            used[idx] = true;
            order.push(idx);
        }
        Ok(order)
    }

    fn apply(&self, column: usize, x: f64) -> f64 {
        match &self.transform {
            ScalerTransform::Identity => x,
            ScalerTransform::Standard { mean, scale } => (x - mean[column]) / scale[column],
            ScalerTransform::MinMax { min, scale } => x * scale[column] + min[column],
            ScalerTransform::Robust { center, scale } => (x - center[column]) / scale[column],
        }
    }
}

/// Builds the classifier input matrix: rows in batch order, columns in the
/// scaler's fit order, values transformed.
pub fn scale(batch: &CleanBatch, scaler: &FittedScaler) -> Result<Array2<f64>, PipelineError> {
    if batch.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }
    let order = scaler.column_order(batch.feature_names())?;
    let records = batch.records();

    Ok(Array2::from_shape_fn((records.len(), order.len()), |(i, j)| {
        scaler.apply(j, records[i].features[order[j]])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawBatch;
    use crate::normalizer::normalize;
    use crate::schema::VITALS;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn vitals_clean() -> CleanBatch {
        let raw = RawBatch::from_csv_str(
            "Suhu,SpO2,HeartRate,SYS,DIA\n36.5,98,90,120,80\n37.5,94,110,140,90\n",
        )
        .unwrap();
        normalize(&raw, &VITALS).unwrap()
    }

    #[test]
    fn test_standard_scaling_reorders_columns() {
        let scaler = FittedScaler {
            feature_names: names(&["SYS", "DIA", "Temperature", "SpO2", "HeartRate"]),
            transform: ScalerTransform::Standard {
                mean: vec![120.0, 80.0, 36.5, 96.0, 90.0],
                scale: vec![10.0, 5.0, 0.5, 2.0, 10.0],
            },
        };
        scaler.validate().unwrap();
        let matrix = scale(&vitals_clean(), &scaler).unwrap();
        assert_eq!(matrix.shape(), &[2, 5]);
        assert_eq!(matrix.row(0).to_vec(), vec![0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(matrix.row(1).to_vec(), vec![2.0, 2.0, 2.0, -1.0, 2.0]);
    }

    #[test]
    fn test_min_max_scaling() {
        let scaler = FittedScaler {
            feature_names: VITALS.feature_names(),
            transform: ScalerTransform::MinMax {
                min: vec![-36.0, 0.0, 0.0, 0.0, -8.0],
                scale: vec![1.0, 0.01, 0.01, 0.01, 0.1],
            },
        };
        let matrix = scale(&vitals_clean(), &scaler).unwrap();
        assert!((matrix[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((matrix[[0, 4]] - 0.0).abs() < 1e-12);
        assert!((matrix[[1, 4]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_feature_set_mismatch() {
        let scaler = FittedScaler {
            feature_names: names(&["Temperature", "SpO2", "HeartRate", "SYS", "MAP"]),
            transform: ScalerTransform::Identity,
        };
        assert!(matches!(
            scale(&vitals_clean(), &scaler),
            Err(PipelineError::FeatureOrderMismatch { .. })
        ));

        let short = FittedScaler {
            feature_names: names(&["Temperature", "SpO2"]),
            transform: ScalerTransform::Identity,
        };
        assert!(short.column_order(&VITALS.feature_names()).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let raw = RawBatch::from_csv_str("Suhu,SpO2,HeartRate,SYS,DIA\n0,98,90,120,80\n").unwrap();
        let clean = normalize(&raw, &VITALS).unwrap();
        let scaler = FittedScaler {
            feature_names: VITALS.feature_names(),
            transform: ScalerTransform::Identity,
        };
        assert!(matches!(scale(&clean, &scaler), Err(PipelineError::EmptyBatch)));
    }

    #[test]
    fn test_validation() {
        let bad_len = FittedScaler {
            feature_names: names(&["a", "b"]),
            transform: ScalerTransform::Standard { mean: vec![0.0], scale: vec![1.0, 1.0] },
        };
        assert!(bad_len.validate().is_err());

        let zero_scale = FittedScaler {
            feature_names: names(&["a"]),
            transform: ScalerTransform::Robust { center: vec![0.0], scale: vec![0.0] },
        };
        assert!(zero_scale.validate().is_err());

        let duplicate = FittedScaler {
            feature_names: names(&["a", "a"]),
            transform: ScalerTransform::Identity,
        };
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "feature_names": ["a", "b"],
            "transform": {"kind": "standard", "mean": [1.0, 2.0], "scale": [0.5, 4.0]}
        }"#;
        let scaler: FittedScaler = serde_json::from_str(json).unwrap();
        assert!(scaler.validate().is_ok());
        assert_eq!(scaler.apply(1, 6.0), 1.0);
    }
}
