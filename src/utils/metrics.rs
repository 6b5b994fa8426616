use crate::error::{MfError, Result};
use serde::{Deserialize, Serialize};

fn check_pair(predicted: &[f64], actual: &[f64]) -> Result<()> {
    if predicted.len() != actual.len() {
        return Err(MfError::ShapeMismatch {
            what: "ratings",
            got: actual.len(),
            expected: predicted.len(),
        });
    }
    if predicted.is_empty() {
        return Err(MfError::EmptyInput("ratings"));
    }
    Ok(())
}

/// Mean of squared differences, no Bessel correction.
pub fn mse(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_pair(predicted, actual)?;
    let total: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a) * (p - a))
        .sum();
    Ok(total / predicted.len() as f64)
}

pub fn rmse(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    Ok(mse(predicted, actual)?.sqrt())
}

pub fn mae(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_pair(predicted, actual)?;
    let total: f64 = predicted.iter().zip(actual).map(|(p, a)| (p - a).abs()).sum();
    Ok(total / predicted.len() as f64)
}

/// Error summary of a set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub count: usize,
    pub rmse: f64,
    pub mae: f64,
}

impl EvaluationReport {
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Result<Self> {
        Ok(Self {
            count: predicted.len(),
            rmse: rmse(predicted, actual)?,
            mae: mae(predicted, actual)?,
        })
    }
}
