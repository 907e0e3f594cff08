//! Least squares solver for the linear baseline forecaster.
//!
//! We solve
//!
//! ```text
//! minimize ||X B - Y||^2
//! ```
//!
//! where each row of `X` is an input window (plus an intercept column) and
//! each column of `Y` is one forecast step. SVD handles tall and
//! rank-deficient design matrices (e.g. flat stretches of a series produce
//! collinear columns).

use nalgebra::DMatrix;

/// Solve a (multi-output) least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let svd = x.clone().svd(true, true);

    // Tolerances are relative to the largest singular value so that collinear
    // columns are dropped regardless of the data scale.
    let scale = svd.singular_values.max().max(1.0);

    // Try progressively looser tolerances if the strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol * scale) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
