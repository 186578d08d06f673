//! Bootstrap confidence intervals for evaluation metrics.
//!
//! Given paired true/predicted values we draw `n_resamples` index samples of size
//! `n` with replacement, compute RMSE, MAE and R² on each, and report the
//! [2.5th, 97.5th] percentile band of each metric as its 95% interval.
//!
//! R² is undefined on a resample whose true values have no variance (always the
//! case for `n = 1`). Such resamples are counted and left out of the R² band; if
//! none define R², the band is `None` and reports print it as "undefined".

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, ErrorKind};
use crate::math::{mae, percentile, r2, rmse};

pub const LOWER_PERCENTILE: f64 = 2.5;
pub const UPPER_PERCENTILE: f64 = 97.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub n_resamples: usize,
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_resamples: 1000,
            seed: None,
        }
    }
}

/// A percentile band for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricBand {
    pub lower: f64,
    pub upper: f64,
}

impl MetricBand {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    fn from_samples(values: &mut [f64]) -> Option<Self> {
        let lower = percentile(values, LOWER_PERCENTILE)?;
        let upper = percentile(values, UPPER_PERCENTILE)?;
        Some(Self { lower, upper })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub n: usize,
    pub n_resamples: usize,
    pub rmse: MetricBand,
    pub mae: MetricBand,
    /// `None` when no resample had a defined R².
    pub r2: Option<MetricBand>,
    pub r2_undefined_resamples: usize,
}

/// 95% bootstrap intervals for RMSE, MAE and R².
pub fn bootstrap_metrics(
    y_true: &[f64],
    y_pred: &[f64],
    config: &BootstrapConfig,
) -> Result<BootstrapReport, AppError> {
    if y_true.is_empty() {
        return Err(AppError::config("Bootstrap needs at least one sample."));
    }
    if y_true.len() != y_pred.len() {
        return Err(AppError::config(format!(
            "Got {} true values but {} predictions.",
            y_true.len(),
            y_pred.len()
        )));
    }
    if config.n_resamples < 2 {
        return Err(AppError::config("Bootstrap needs at least 2 resamples."));
    }

    let n = y_true.len();
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut rmses = Vec::with_capacity(config.n_resamples);
    let mut maes = Vec::with_capacity(config.n_resamples);
    let mut r2s = Vec::with_capacity(config.n_resamples);
    let mut r2_undefined = 0usize;

    let mut t = vec![0.0; n];
    let mut p = vec![0.0; n];
    for _ in 0..config.n_resamples {
        for k in 0..n {
            let i = rng.gen_range(0..n);
            t[k] = y_true[i];
            p[k] = y_pred[i];
        }
        rmses.push(rmse(&t, &p));
        maes.push(mae(&t, &p));
        match r2(&t, &p) {
            Ok(v) => r2s.push(v),
            Err(e) if e.kind() == ErrorKind::DegenerateResample => r2_undefined += 1,
            Err(e) => return Err(e),
        }
    }

    if r2_undefined > 0 {
        debug!(r2_undefined, n_resamples = config.n_resamples, "resamples with undefined R²");
    }

    let band = |values: &mut Vec<f64>| {
        MetricBand::from_samples(values)
            .ok_or_else(|| AppError::new(ErrorKind::DegenerateResample, "Empty bootstrap distribution."))
    };

    Ok(BootstrapReport {
        n,
        n_resamples: config.n_resamples,
        rmse: band(&mut rmses)?,
        mae: band(&mut maes)?,
        r2: MetricBand::from_samples(&mut r2s),
        r2_undefined_resamples: r2_undefined,
    })
}
