//! Temporal aggregation.
//!
//! - `bucket`: calendar bucketing (`h`, `3h`, `6h`, `dw`, `m`, `s`)
//! - `behind`: fixed-size backward grouping with hold-constant back-fill
//! - `select`: time-range selection and calendar features

pub mod behind;
pub mod bucket;
pub mod select;

pub use behind::*;
pub use bucket::*;
pub use select::*;
