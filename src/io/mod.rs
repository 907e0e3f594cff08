//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - cleaned table, prediction and metrics exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
