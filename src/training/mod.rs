//! Model training.
//!
//! Responsibilities:
//!
//! - partition rows into a held-out test set and k cross-validation folds
//! - random-search the forest hyperparameters, scoring trials in parallel
//! - refit the winner on all training rows
//! - compare the shipped model against a mean baseline with bootstrap bands

pub mod compare;
pub mod folds;
pub mod search;

pub use compare::*;
pub use folds::*;
pub use search::*;
