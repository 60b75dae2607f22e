use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{argmax, check_width};
use super::{ClassIndex, ClassPredictor};

/// A linear decision function per class, as exported from a fitted
/// logistic regression or linear SVM.
///
/// `coefficients` has one row per class. A single row is the binary case:
/// a positive score selects class 1, anything else class 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LinearModel {
    pub fn new(coefficients: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Result<Self, ClassifierError> {
        let model = Self {
            coefficients,
            intercepts,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        let width = self
            .coefficients
            .first()
            .map(Vec::len)
            .ok_or_else(|| ClassifierError::ValidationError("Linear model has no coefficients".into()))?;
        if width == 0 {
            return Err(ClassifierError::ValidationError("Linear model has zero features".into()));
        }
        if let Some(pos) = self.coefficients.iter().position(|row| row.len() != width) {
            return Err(ClassifierError::ValidationError(format!(
                "Coefficient row {} has {} values, expected {}",
                pos,
                self.coefficients[pos].len(),
                width
            )));
        }
        if self.intercepts.len() != self.coefficients.len() {
            return Err(ClassifierError::ValidationError(format!(
                "{} intercepts for {} coefficient rows",
                self.intercepts.len(),
                self.coefficients.len()
            )));
        }
        let finite = self
            .coefficients
            .iter()
            .flatten()
            .chain(self.intercepts.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(ClassifierError::ValidationError("Linear model parameters must be finite".into()));
        }
        Ok(())
    }

    fn width(&self) -> usize {
        self.coefficients.first().map(Vec::len).unwrap_or(0)
    }

    fn decision(&self, class: usize, row: impl Iterator<Item = f64>) -> f64 {
        self.coefficients[class]
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercepts[class]
    }
}

impl ClassPredictor for LinearModel {
    fn backend(&self) -> &'static str {
        "linear"
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.width())
    }

    fn n_classes(&self) -> Option<usize> {
        match self.coefficients.len() {
            1 => Some(2),
            n => Some(n),
        }
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<ClassIndex>, ClassifierError> {
        check_width(&features, self.width())?;

        features
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                if self.coefficients.len() == 1 {
                    let score = self.decision(0, row.iter().copied());
                    return Ok(if score > 0.0 { 1 } else { 0 });
                }
                let scores = (0..self.coefficients.len()).map(|c| self.decision(c, row.iter().copied()));
                argmax(scores)
                    .map(|c| c as ClassIndex)
                    .ok_or_else(|| ClassifierError::PredictionError(format!("Row {} has no finite class score", i)))
            })
            .collect()
    }
}
