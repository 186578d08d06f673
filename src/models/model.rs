//! The regressor seam.
//!
//! Anything that maps a fused feature vector to a salary implements `Regressor`.
//! The width check lives here so every implementation reports version skew the
//! same way.

use nalgebra::DMatrix;

use crate::domain::FeatureVector;
use crate::error::AppError;

pub trait Regressor: Send + Sync {
    /// Short type name reported by the health check.
    fn model_type(&self) -> &'static str;

    /// Width of the feature vectors seen at fit time.
    fn n_features(&self) -> usize;

    /// Predict one row; `DimensionMismatch` if `row.len() != n_features()`.
    fn predict_row(&self, row: &[f64]) -> Result<f64, AppError>;

    fn predict(&self, features: &FeatureVector) -> Result<f64, AppError> {
        self.predict_row(features.as_slice())
    }

    fn predict_matrix(&self, x: &DMatrix<f64>) -> Result<Vec<f64>, AppError> {
        check_width(self.n_features(), x.ncols())?;
        let mut row = vec![0.0; x.ncols()];
        let mut out = Vec::with_capacity(x.nrows());
        for i in 0..x.nrows() {
            for (j, v) in x.row(i).iter().enumerate() {
                row[j] = *v;
            }
            out.push(self.predict_row(&row)?);
        }
        Ok(out)
    }
}

pub fn check_width(expected: usize, got: usize) -> Result<(), AppError> {
    if expected != got {
        return Err(AppError::dimension(format!(
            "X has {got} features, but the model is expecting {expected} features as input."
        )));
    }
    Ok(())
}
