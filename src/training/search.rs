//! Hyperparameter search and final refit.
//!
//! The trainer walks a fixed sequence of phases:
//!
//! - **Configure**: data and settings are validated, nothing has been fit
//! - **Search**: `n_trials` parameter sets were drawn and scored by k-fold CV
//! - **Refit**: the best parameters were refit on every training row
//! - **Done**: the outcome has been handed out
//!
//! Calling a phase out of order is an `InvalidConfig` error rather than a panic.
//!
//! Parameter sets are drawn by uniform random search over the inclusive ranges
//! of [`SearchSpace`]. The sampler is seeded only when `search_seed` is set; the
//! forest itself is always seeded with `model_seed`, so two runs that draw the
//! same parameters produce the same model.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{ForestParams, SearchSpace, TrainConfig, TrialResult};
use crate::error::{AppError, ErrorKind};
use crate::math::{mean, rmse};
use crate::models::{ForestConfig, RandomForest, Regressor};
use crate::training::folds::{Fold, kfold_indices};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Configure,
    Search,
    Refit,
    Done,
}

/// Everything a finished training run hands back.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: RandomForest,
    pub best: TrialResult,
    /// Every scored trial, in trial order.
    pub trials: Vec<TrialResult>,
}

pub struct ModelTrainer {
    config: TrainConfig,
    x: DMatrix<f64>,
    y: Vec<f64>,
    folds: Vec<Fold>,
    state: TrainerState,
    trials: Vec<TrialResult>,
    best: Option<TrialResult>,
    model: Option<RandomForest>,
}

impl ModelTrainer {
    /// Validate settings and data; the trainer starts in `Configure`.
    pub fn new(config: TrainConfig, x: DMatrix<f64>, y: Vec<f64>) -> Result<Self, AppError> {
        validate_space(&config.search_space)?;
        if config.n_trials == 0 {
            return Err(AppError::config("Need at least 1 search trial."));
        }
        if x.nrows() != y.len() {
            return Err(AppError::dimension(format!(
                "Training matrix has {} rows but {} targets were given.",
                x.nrows(),
                y.len()
            )));
        }
        if y.len() < config.n_folds {
            return Err(AppError::new(
                ErrorKind::InsufficientData,
                format!("{} training rows cannot fill {} folds.", y.len(), config.n_folds),
            ));
        }
        let folds = kfold_indices(y.len(), config.n_folds)?;

        Ok(Self {
            config,
            x,
            y,
            folds,
            state: TrainerState::Configure,
            trials: Vec::new(),
            best: None,
            model: None,
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn trials(&self) -> &[TrialResult] {
        &self.trials
    }

    /// Draw and score every trial. Trials run in parallel.
    pub fn search(&mut self) -> Result<&TrialResult, AppError> {
        self.expect_state(TrainerState::Configure, "search")?;

        let mut rng = match self.config.search_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let candidates: Vec<ForestParams> = (0..self.config.n_trials)
            .map(|_| sample_params(&self.config.search_space, &mut rng))
            .collect();

        info!(
            n_trials = candidates.len(),
            n_folds = self.folds.len(),
            n_rows = self.y.len(),
            "starting hyperparameter search"
        );

        let trials: Vec<TrialResult> = candidates
            .par_iter()
            .enumerate()
            .map(|(trial, params)| self.score_trial(trial, *params))
            .collect::<Result<_, _>>()?;

        // Highest score wins; ties go to the earlier trial.
        let mut best = &trials[0];
        for t in &trials[1..] {
            if t.score > best.score {
                best = t;
            }
        }
        info!(
            trial = best.trial,
            score = best.score,
            n_estimators = best.params.n_estimators,
            max_depth = best.params.max_depth,
            min_samples_split = best.params.min_samples_split,
            "best trial"
        );

        self.best = Some(best.clone());
        self.trials = trials;
        self.state = TrainerState::Search;
        self.best
            .as_ref()
            .ok_or_else(|| AppError::config("Search produced no trials."))
    }

    /// Fit the best parameters on all training rows.
    pub fn refit(&mut self) -> Result<&RandomForest, AppError> {
        self.expect_state(TrainerState::Search, "refit")?;
        let best = self
            .best
            .as_ref()
            .ok_or_else(|| AppError::config("refit called before a best trial exists."))?;

        let forest_config =
            ForestConfig::from_params(best.params, self.config.max_features, self.config.model_seed);
        let model = RandomForest::fit(&self.x, &self.y, &forest_config)?;
        info!(n_trees = model.n_trees(), n_features = model.n_features(), "refit final model");

        self.state = TrainerState::Refit;
        Ok(self.model.insert(model))
    }

    pub fn finish(&mut self) -> Result<TrainingOutcome, AppError> {
        self.expect_state(TrainerState::Refit, "finish")?;
        let (Some(model), Some(best)) = (self.model.take(), self.best.take()) else {
            return Err(AppError::config("Trainer has no fitted model to hand out."));
        };
        self.state = TrainerState::Done;
        Ok(TrainingOutcome {
            model,
            best,
            trials: std::mem::take(&mut self.trials),
        })
    }

    /// Search, refit and finish in one call.
    pub fn run(config: TrainConfig, x: DMatrix<f64>, y: Vec<f64>) -> Result<TrainingOutcome, AppError> {
        let mut trainer = Self::new(config, x, y)?;
        trainer.search()?;
        trainer.refit()?;
        trainer.finish()
    }

    fn expect_state(&self, want: TrainerState, op: &str) -> Result<(), AppError> {
        if self.state != want {
            return Err(AppError::config(format!(
                "Cannot {op} while the trainer is in {:?} (expected {want:?}).",
                self.state
            )));
        }
        Ok(())
    }

    fn score_trial(&self, trial: usize, params: ForestParams) -> Result<TrialResult, AppError> {
        let forest_config =
            ForestConfig::from_params(params, self.config.max_features, self.config.model_seed);

        let mut fold_scores = Vec::with_capacity(self.folds.len());
        for fold in &self.folds {
            let x_train = self.x.select_rows(fold.train.iter());
            let y_train: Vec<f64> = fold.train.iter().map(|&i| self.y[i]).collect();
            let x_valid = self.x.select_rows(fold.valid.iter());
            let y_valid: Vec<f64> = fold.valid.iter().map(|&i| self.y[i]).collect();

            let forest = RandomForest::fit(&x_train, &y_train, &forest_config)?;
            let pred = forest.predict_matrix(&x_valid)?;
            fold_scores.push(-rmse(&y_valid, &pred));
        }

        let score = mean(&fold_scores)
            .ok_or_else(|| AppError::new(ErrorKind::InsufficientData, "No folds were scored."))?;
        debug!(trial, score, ?params, "trial scored");
        Ok(TrialResult {
            trial,
            params,
            score,
            fold_scores,
        })
    }
}

/// One uniform draw from each inclusive range.
pub fn sample_params(space: &SearchSpace, rng: &mut StdRng) -> ForestParams {
    ForestParams {
        n_estimators: rng.gen_range(space.n_estimators.0..=space.n_estimators.1),
        max_depth: rng.gen_range(space.max_depth.0..=space.max_depth.1),
        min_samples_split: rng.gen_range(space.min_samples_split.0..=space.min_samples_split.1),
    }
}

fn validate_space(space: &SearchSpace) -> Result<(), AppError> {
    let ranges = [
        ("n_estimators", space.n_estimators, 1),
        ("max_depth", space.max_depth, 1),
        ("min_samples_split", space.min_samples_split, 2),
    ];
    for (name, (lo, hi), floor) in ranges {
        if lo > hi {
            return Err(AppError::config(format!("{name} range is empty ({lo}..={hi}).")));
        }
        if lo < floor {
            return Err(AppError::config(format!("{name} must be >= {floor} (got {lo}).")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MaxFeatures;

    fn data(n: usize) -> (DMatrix<f64>, Vec<f64>) {
        let x = DMatrix::from_fn(n, 2, |i, j| if j == 0 { i as f64 } else { (i % 5) as f64 });
        let y: Vec<f64> = (0..n).map(|i| 30_000.0 + 1_500.0 * i as f64).collect();
        (x, y)
    }

    fn small_config() -> TrainConfig {
        TrainConfig {
            search_space: SearchSpace {
                n_estimators: (3, 8),
                max_depth: (2, 5),
                min_samples_split: (2, 6),
            },
            n_trials: 4,
            n_folds: 3,
            search_seed: Some(9),
            max_features: MaxFeatures::All,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn search_keeps_every_trial_and_picks_the_max() {
        let (x, y) = data(30);
        let outcome = ModelTrainer::run(small_config(), x, y).unwrap();
        assert_eq!(outcome.trials.len(), 4);
        let max = outcome.trials.iter().map(|t| t.score).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.best.score, max);
        for t in &outcome.trials {
            assert_eq!(t.fold_scores.len(), 3);
            assert!(t.score <= 0.0);
            assert!((3..=8).contains(&t.params.n_estimators));
        }
        assert_eq!(outcome.model.n_trees(), outcome.best.params.n_estimators);
    }

    #[test]
    fn seeded_search_is_reproducible() {
        let (x, y) = data(24);
        let a = ModelTrainer::run(small_config(), x.clone(), y.clone()).unwrap();
        let b = ModelTrainer::run(small_config(), x, y).unwrap();
        assert_eq!(a.trials, b.trials);
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn phases_must_run_in_order() {
        let (x, y) = data(20);
        let mut trainer = ModelTrainer::new(small_config(), x, y).unwrap();
        assert_eq!(trainer.refit().unwrap_err().kind(), ErrorKind::InvalidConfig);
        assert_eq!(trainer.finish().unwrap_err().kind(), ErrorKind::InvalidConfig);
        trainer.search().unwrap();
        assert_eq!(trainer.state(), TrainerState::Search);
        assert_eq!(trainer.search().unwrap_err().kind(), ErrorKind::InvalidConfig);
        trainer.refit().unwrap();
        trainer.finish().unwrap();
        assert_eq!(trainer.state(), TrainerState::Done);
        assert_eq!(trainer.finish().unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn bad_settings_are_rejected() {
        let (x, y) = data(20);
        let mut c = small_config();
        c.search_space.max_depth = (5, 2);
        assert!(ModelTrainer::new(c, x.clone(), y.clone()).is_err());

        let mut c = small_config();
        c.n_trials = 0;
        assert!(ModelTrainer::new(c, x.clone(), y.clone()).is_err());

        let (x2, y2) = data(2);
        let err = ModelTrainer::new(small_config(), x2, y2).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn sampled_params_stay_in_range() {
        let space = SearchSpace::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let p = sample_params(&space, &mut rng);
            assert!((100..=1000).contains(&p.n_estimators));
            assert!((3..=15).contains(&p.max_depth));
            assert!((2..=20).contains(&p.min_samples_split));
        }
    }
}
