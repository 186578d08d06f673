//! Uncertainty around predictions and metrics.
//!
//! Two unrelated things share this module. `band` is the ±10% range attached to
//! every served prediction. `bootstrap` resamples a held-out test set to put
//! 95% intervals on RMSE, MAE and R² during evaluation.

pub mod band;
pub mod bootstrap;

pub use band::*;
pub use bootstrap::*;
