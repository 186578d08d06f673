//! Serving-time ±10% band.
//!
//! This is a fixed-width heuristic, not a statistical confidence interval: it
//! knows nothing about the model's error distribution. The evaluation-time
//! interval lives in `bootstrap` and is deliberately a separate function.

pub const LOWER_FACTOR: f64 = 0.9;
pub const UPPER_FACTOR: f64 = 1.1;

/// `[0.9 × estimate, 1.1 × estimate]`, ordered so that `lower <= estimate <= upper`
/// also holds for negative estimates.
pub fn heuristic_band(estimate: f64) -> (f64, f64) {
    let a = estimate * LOWER_FACTOR;
    let b = estimate * UPPER_FACTOR;
    (a.min(b), a.max(b))
}
