//! Mathematical utilities: least squares and forecast error metrics.

pub mod metrics;
pub mod ols;

pub use metrics::*;
pub use ols::*;
