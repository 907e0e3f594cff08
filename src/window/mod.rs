//! Windowing: fixed-size blocks and supervised `(x, y)` pairs.
//!
//! - `sliding`: overlapping blocks with a stride, offset splits
//! - `pairs`: aligned input/output windows for the learner

pub mod pairs;
pub mod sliding;

pub use pairs::*;
pub use sliding::*;
