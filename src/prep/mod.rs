//! Data preparation ahead of windowing.
//!
//! - `merge`: clean and outer-join the raw air-quality and weather sources
//! - `stations`: extract one ordered series per prediction station

pub mod merge;
pub mod stations;

pub use merge::*;
pub use stations::*;
