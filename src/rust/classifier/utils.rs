use ndarray::ArrayView2;

use super::error::ClassifierError;

/// Index of the largest value; ties go to the lowest index. NaN never wins.
pub(crate) fn argmax(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub(crate) fn check_width(features: &ArrayView2<'_, f64>, expected: usize) -> Result<(), ClassifierError> {
    let width = features.ncols();
    if width != expected {
        return Err(ClassifierError::ValidationError(format!(
            "Model expects {} features, got {}",
            expected, width
        )));
    }
    Ok(())
}
