//! Model-vs-baseline evaluation on the held-out test set.
//!
//! Both models are scored with the same bootstrap settings. When a seed is set,
//! both runs draw identical resample indices, so the two bands are paired.
//! No pass/fail verdict is computed; the overlap flags only describe the bands.

use nalgebra::DMatrix;
use serde::Serialize;
use tracing::info;

use crate::confidence::{BootstrapConfig, BootstrapReport, MetricBand, bootstrap_metrics};
use crate::error::AppError;
use crate::models::{MeanRegressor, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub model_type: String,
    pub model: BootstrapReport,
    pub baseline: BootstrapReport,
}

impl ComparisonReport {
    /// True when the model's RMSE band reaches into (or above) the baseline's.
    pub fn rmse_overlaps(&self) -> bool {
        reaches(&self.model.rmse, &self.baseline.rmse)
    }

    pub fn mae_overlaps(&self) -> bool {
        reaches(&self.model.mae, &self.baseline.mae)
    }
}

fn reaches(model: &MetricBand, baseline: &MetricBand) -> bool {
    model.upper >= baseline.lower
}

/// Fit the mean baseline on `y_train`, then bootstrap both models on the test rows.
pub fn compare_with_baseline(
    model: &dyn Regressor,
    y_train: &[f64],
    x_test: &DMatrix<f64>,
    y_test: &[f64],
    config: &BootstrapConfig,
) -> Result<ComparisonReport, AppError> {
    let baseline = MeanRegressor::fit(y_train, model.n_features())?;

    let model_pred = model.predict_matrix(x_test)?;
    let baseline_pred = baseline.predict_matrix(x_test)?;

    let model_report = bootstrap_metrics(y_test, &model_pred, config)?;
    let baseline_report = bootstrap_metrics(y_test, &baseline_pred, config)?;

    info!(
        model_rmse_upper = model_report.rmse.upper,
        baseline_rmse_lower = baseline_report.rmse.lower,
        "bootstrap comparison finished"
    );

    Ok(ComparisonReport {
        model_type: model.model_type().to_string(),
        model: model_report,
        baseline: baseline_report,
    })
}
