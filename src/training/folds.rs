//! Row partitioning: k-fold cross-validation and the held-out test split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{AppError, ErrorKind};

/// One cross-validation fold: fit on `train`, score on `valid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Contiguous, unshuffled folds over `0..n`.
///
/// The first `n % k` validation folds hold one extra row, so every row appears
/// in exactly one validation fold.
pub fn kfold_indices(n: usize, k: usize) -> Result<Vec<Fold>, AppError> {
    if k < 2 {
        return Err(AppError::config(format!("Need at least 2 folds (got {k}).")));
    }
    if n < k {
        return Err(AppError::config(format!(
            "Cannot split {n} rows into {k} folds."
        )));
    }

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = base + usize::from(i < extra);
        let end = start + size;
        let valid: Vec<usize> = (start..end).collect();
        let train: Vec<usize> = (0..start).chain(end..n).collect();
        folds.push(Fold { train, valid });
        start = end;
    }
    Ok(folds)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle of `0..n`, then the first `ceil(n * test_fraction)` rows
/// become the test set.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<TrainTestSplit, AppError> {
    if !(test_fraction.is_finite() && test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::config(format!(
            "test fraction must be in (0, 1) (got {test_fraction})."
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(AppError::new(
            ErrorKind::InsufficientData,
            format!("{n} rows are too few for a {test_fraction} test split."),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok(TrainTestSplit { train, test: order })
}
