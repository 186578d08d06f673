//! Mean-predicting baseline.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::math::mean;
use crate::models::model::{Regressor, check_width};

/// Ignores its inputs and predicts the training-target mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanRegressor {
    mean: f64,
    n_features: usize,
}

impl MeanRegressor {
    pub fn fit(y: &[f64], n_features: usize) -> Result<Self, AppError> {
        let mean = mean(y).ok_or_else(|| {
            AppError::new(ErrorKind::InsufficientData, "Cannot fit the baseline on zero targets.")
        })?;
        Ok(Self { mean, n_features })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl Regressor for MeanRegressor {
    fn model_type(&self) -> &'static str {
        "MeanRegressor"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64, AppError> {
        check_width(self.n_features, row.len())?;
        Ok(self.mean)
    }
}
