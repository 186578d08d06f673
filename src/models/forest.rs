//! Bagged ensemble of regression trees.
//!
//! Each tree is grown on a bootstrap sample of the rows and considers
//! `max_features` randomly chosen columns per split. Trees are fit in parallel;
//! tree `i` always uses an RNG seeded from `(seed, i)`, so the fitted forest does
//! not depend on how rayon schedules the work.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{ForestParams, MaxFeatures};
use crate::error::AppError;
use crate::models::model::{Regressor, check_width};
use crate::models::tree::{RegressionTree, TreeParams};

/// Full forest configuration (search parameters + fixed settings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl ForestConfig {
    pub fn from_params(params: ForestParams, max_features: MaxFeatures, seed: u64) -> Self {
        Self {
            n_estimators: params.n_estimators,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features,
            seed,
        }
    }

    pub fn params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.n_estimators == 0 {
            return Err(AppError::config("n_estimators must be >= 1."));
        }
        if self.max_depth == 0 {
            return Err(AppError::config("max_depth must be >= 1."));
        }
        if self.min_samples_split < 2 {
            return Err(AppError::config("min_samples_split must be >= 2."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fit on a dense matrix (rows = samples) and its targets.
    pub fn fit(x: &DMatrix<f64>, y: &[f64], config: &ForestConfig) -> Result<Self, AppError> {
        config.validate()?;
        if x.nrows() != y.len() {
            return Err(AppError::dimension(format!(
                "Feature matrix has {} rows but {} targets were given.",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(AppError::new(
                crate::error::ErrorKind::InsufficientData,
                "Cannot fit a forest on an empty matrix.",
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(AppError::schema("Training targets must be finite."));
        }

        let n_rows = x.nrows();
        let tree_params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: config.max_features.resolve(x.ncols()),
        };

        let trees: Vec<RegressionTree> = (0..config.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(tree_seed(config.seed, i));
                let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
                RegressionTree::fit(x, y, rows, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self {
            config: *config,
            n_features: x.ncols(),
            trees,
        })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Structural check for a forest that came from disk rather than `fit`.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.trees.is_empty() {
            return Err(AppError::load("Forest has no trees."));
        }
        if self.n_features == 0 {
            return Err(AppError::load("Forest expects zero features."));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|msg| AppError::load(format!("Tree {i} is malformed: {msg}")))?;
        }
        Ok(())
    }
}

impl Regressor for RandomForest {
    fn model_type(&self) -> &'static str {
        "RandomForestRegressor"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64, AppError> {
        check_width(self.n_features, row.len())?;
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }
}

/// SplitMix64 step so neighbouring tree indices get unrelated streams.
fn tree_seed(seed: u64, index: usize) -> u64 {
    let mut z = seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
