//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw inputs (`RawRecord`, `LabeledRecord`, `EducationLevel`)
//! - feature blocks (`TabularBlock`, `TextBlock`, `FeatureVector`)
//! - training-time types (`ForestParams`, `SearchSpace`, `TrialResult`, `TrainConfig`)
//! - serving output (`PredictionResult`)

pub mod types;

pub use types::*;
