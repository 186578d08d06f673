//! Data sources that do not come from a CSV on disk.
//!
//! - seeded synthetic salary dataset (`synthetic`), used by `salary synth` and tests

pub mod synthetic;

pub use synthetic::*;
