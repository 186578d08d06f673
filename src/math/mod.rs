//! Mathematical utilities: descriptive statistics and regression metrics.

pub mod stats;

pub use stats::*;
