//! The forecaster interface and shared matrix helpers.

use nalgebra::DMatrix;

use crate::error::ModelError;

/// Validation data passed to `Forecaster::fit`.
pub type ValidationSet<'a> = (&'a [Vec<f64>], &'a [Vec<f64>]);

/// Training outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs_run: usize,
    /// Mean squared error on the training set after the last epoch
    /// (in standardized units for the MLP).
    pub final_train_loss: f64,
    /// Best validation loss seen, if a validation set was given.
    pub best_valid_loss: Option<f64>,
    /// Training loss after each epoch.
    pub history: Vec<f64>,
}

pub trait Forecaster {
    fn name(&self) -> &'static str;

    /// Fit on input windows `x` and output windows `y` (same number of rows).
    fn fit(
        &mut self,
        x: &[Vec<f64>],
        y: &[Vec<f64>],
        valid: Option<ValidationSet<'_>>,
    ) -> Result<FitReport, ModelError>;

    /// Predict one output window per input window.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError>;
}

/// Stack equally sized rows into an `n x d` matrix.
pub fn to_matrix(rows: &[Vec<f64>]) -> Result<DMatrix<f64>, ModelError> {
    let Some(first) = rows.first() else {
        return Err(ModelError::EmptyTrainingSet);
    };
    let cols = first.len();
    if cols == 0 {
        return Err(ModelError::ShapeMismatch("rows must not be empty".to_string()));
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
        return Err(ModelError::ShapeMismatch(format!(
            "row {bad} has {} columns, expected {cols}",
            rows[bad].len()
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), cols, |i, j| rows[i][j]))
}

pub fn from_matrix(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

/// Mean squared error over every entry.
pub fn mse(pred: &DMatrix<f64>, target: &DMatrix<f64>) -> f64 {
    let n = pred.len().max(1) as f64;
    (pred - target).iter().map(|d| d * d).sum::<f64>() / n
}

/// Per-column z-score scaling fitted on training data.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Standardizer {
    pub fn fit(m: &DMatrix<f64>) -> Self {
        let n = m.nrows().max(1) as f64;
        let mut mean = Vec::with_capacity(m.ncols());
        let mut std = Vec::with_capacity(m.ncols());
        for col in m.column_iter() {
            let mu = col.sum() / n;
            let var = col.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / n;
            let sd = var.sqrt();
            mean.push(mu);
            std.push(if sd < 1e-12 { 1.0 } else { sd });
        }
        Self { mean, std }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, m: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| (m[(i, j)] - self.mean[j]) / self.std[j])
    }

    pub fn inverse(&self, m: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] * self.std[j] + self.mean[j])
    }
}

pub(crate) fn check_pairs(x: &[Vec<f64>], y: &[Vec<f64>]) -> Result<(), ModelError> {
    if x.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(ModelError::ShapeMismatch(format!(
            "{} input windows vs {} output windows",
            x.len(),
            y.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_matrix_rejects_ragged_rows() {
        let err = to_matrix(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch(_)));
        assert_eq!(to_matrix(&[]).unwrap_err(), ModelError::EmptyTrainingSet);
    }

    #[test]
    fn standardizer_inverts() {
        let m = to_matrix(&[vec![1.0, 5.0], vec![3.0, 5.0], vec![5.0, 5.0]]).unwrap();
        let s = Standardizer::fit(&m);
        let z = s.transform(&m);
        // constant column keeps unit scale
        assert!((z[(0, 1)]).abs() < 1e-12);
        assert!((z.column(0).sum()).abs() < 1e-12);
        let back = s.inverse(&z);
        assert!((back - m).abs().max() < 1e-12);
    }
}
