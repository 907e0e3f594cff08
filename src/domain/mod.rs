//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and merged station rows (`AirQualityRow`, `WeatherRow`, `MergedRecord`)
//! - the per-station series (`TimeSeries`) and window pairs (`WindowPairs`)
//! - bucketing enums/keys (`BucketMode`, `BucketKey`, `Reducer`)
//! - run configuration and metrics (`TrainConfig`, `TrainMetrics`, ...)

pub mod types;

pub use types::*;
