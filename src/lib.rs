//! `aq-forecast` library crate.
//!
//! The binary (`aq`) is a thin wrapper around this library so that:
//!
//! - the windowing and temporal aggregation core is testable without
//!   spawning processes
//! - the pipeline stages (clean, bucket, train) can be driven from code

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod prep;
pub mod report;
pub mod times;
pub mod window;
