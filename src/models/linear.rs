//! Linear baseline: one least-squares map from an input window to every step
//! of the output window.

use nalgebra::DMatrix;

use crate::error::ModelError;
use crate::math::solve_least_squares;
use crate::models::forecaster::{
    FitReport, Forecaster, ValidationSet, check_pairs, from_matrix, mse, to_matrix,
};

#[derive(Debug, Clone, Default)]
pub struct LinearForecaster {
    /// `(d + 1) x k` coefficients; row 0 is the intercept.
    coef: Option<DMatrix<f64>>,
}

impl LinearForecaster {
    pub fn new() -> Self {
        Self::default()
    }
}

fn with_intercept(x: &DMatrix<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(x.nrows(), x.ncols() + 1, |i, j| if j == 0 { 1.0 } else { x[(i, j - 1)] })
}

impl Forecaster for LinearForecaster {
    fn name(&self) -> &'static str {
        "Linear"
    }

    fn fit(
        &mut self,
        x: &[Vec<f64>],
        y: &[Vec<f64>],
        valid: Option<ValidationSet<'_>>,
    ) -> Result<FitReport, ModelError> {
        check_pairs(x, y)?;
        let xm = with_intercept(&to_matrix(x)?);
        let ym = to_matrix(y)?;

        let coef = solve_least_squares(&xm, &ym)
            .ok_or_else(|| ModelError::Numerical("least squares solve failed".to_string()))?;
        let train_loss = mse(&(&xm * &coef), &ym);
        self.coef = Some(coef);

        let best_valid_loss = match valid {
            Some((vx, vy)) if !vx.is_empty() => {
                check_pairs(vx, vy)?;
                let pred = to_matrix(&self.predict(vx)?)?;
                Some(mse(&pred, &to_matrix(vy)?))
            }
            _ => None,
        };

        Ok(FitReport {
            epochs_run: 1,
            final_train_loss: train_loss,
            best_valid_loss,
            history: vec![train_loss],
        })
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        let coef = self.coef.as_ref().ok_or(ModelError::NotFitted)?;
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let xm = with_intercept(&to_matrix(x)?);
        if xm.ncols() != coef.nrows() {
            return Err(ModelError::ShapeMismatch(format!(
                "model expects {} inputs, got {}",
                coef.nrows() - 1,
                xm.ncols() - 1
            )));
        }
        Ok(from_matrix(&(xm * coef)))
    }
}
