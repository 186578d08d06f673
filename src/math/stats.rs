//! Small descriptive statistics and regression metrics.
//!
//! Conventions:
//! - All functions take parallel slices `y_true` / `y_pred` of equal length;
//!   callers validate lengths once up front.
//! - `percentile` interpolates linearly between order statistics, so the
//!   2.5th/97.5th percentile of `[a]` is `a` and of `[a, b]` lies between them.

use std::cmp::Ordering;

use crate::error::{AppError, ErrorKind};

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of the finite values; `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// `q`-th percentile (`q` in `[0, 100]`) with linear interpolation.
///
/// Sorts `values` in place.
pub fn percentile(values: &mut [f64], q: f64) -> Option<f64> {
    if values.is_empty() || !q.is_finite() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let q = q.clamp(0.0, 100.0);
    let pos = q / 100.0 * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mse(y_true, y_pred).sqrt()
}

pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / y_true.len() as f64
}

/// Coefficient of determination.
///
/// Undefined when fewer than two samples are given or when `y_true` has no
/// variance; both cases return `DegenerateResample` instead of a made-up number.
pub fn r2(y_true: &[f64], y_pred: &[f64]) -> Result<f64, AppError> {
    if y_true.len() < 2 {
        return Err(AppError::new(
            ErrorKind::DegenerateResample,
            format!("R² is undefined for n={} samples.", y_true.len()),
        ));
    }
    let m = mean(y_true).unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|t| (t - m) * (t - m)).sum();
    // Rounding in `mean` can leave a tiny positive ss_tot for constant inputs.
    if ss_tot <= f64::EPSILON * m * m * y_true.len() as f64 {
        return Err(AppError::new(
            ErrorKind::DegenerateResample,
            "R² is undefined when the true values have zero variance.",
        ));
    }
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)).sum();
    Ok(1.0 - ss_res / ss_tot)
}
