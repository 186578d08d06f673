//! Regression models.
//!
//! `RandomForest` is the estimator that ships in the bundle; `MeanRegressor` is
//! the lower bound it is compared against. Both sit behind `Regressor`.

pub mod baseline;
pub mod forest;
pub mod model;
pub mod tree;

pub use baseline::*;
pub use forest::*;
pub use model::*;

/// The estimator type persisted in a model bundle.
pub type PredictionModel = RandomForest;
