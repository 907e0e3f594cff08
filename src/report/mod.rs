//! Formatted terminal output for the `aq` subcommands.
//!
//! Formatting lives here so the pipeline returns plain data and output
//! changes stay in one place.

mod format;

pub use format::*;
