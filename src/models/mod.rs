//! Forecasters consuming `(x, y)` windows.
//!
//! Both implementations sit behind the `Forecaster` trait so the pipeline
//! treats the learner as a black box: fit on windows, predict new windows.

pub mod forecaster;
pub mod linear;
pub mod mlp;

pub use forecaster::*;
pub use linear::*;
pub use mlp::*;
