//! Shared training and evaluation workflows.
//!
//! Keeping these in one place lets the CLI, the tests and any future front-end
//! run the exact same steps:
//!
//! - training: split -> fit pipeline on train rows -> embed -> fuse -> search ->
//!   refit -> bootstrap model vs. baseline on the test rows -> bundle
//! - evaluation: load bundle -> fuse -> predict -> bootstrap
//!
//! Printing and file output stay in `app`.

use tracing::info;

use crate::confidence::{BootstrapConfig, BootstrapReport, bootstrap_metrics};
use crate::domain::{LabeledRecord, RawRecord, TrainConfig, TrialResult};
use crate::error::AppError;
use crate::features::{FeaturePipeline, HashingEmbedder, PipelineOptions};
use crate::io::{ModelBundle, PredictionRow, encode_records};
use crate::models::Regressor;
use crate::training::{ComparisonReport, ModelTrainer, compare_with_baseline, train_test_split};

/// All computed outputs of a single training run.
#[derive(Debug)]
pub struct TrainRun {
    pub bundle: ModelBundle,
    pub best: TrialResult,
    pub trials: Vec<TrialResult>,
    pub comparison: ComparisonReport,
    pub n_train: usize,
    pub n_test: usize,
}

/// Train a bundle from labeled records.
///
/// The pipeline is fit on the training split only, so the test rows are encoded
/// exactly the way a serving request would be.
pub fn run_training(
    records: &[LabeledRecord],
    config: &TrainConfig,
    options: &PipelineOptions,
    embed_dim: usize,
) -> Result<TrainRun, AppError> {
    let split = train_test_split(records.len(), config.test_fraction, config.split_seed)?;
    let (train_raw, y_train) = gather(records, &split.train);
    let (test_raw, y_test) = gather(records, &split.test);
    info!(n_train = y_train.len(), n_test = y_test.len(), "train/test split");

    let pipeline = FeaturePipeline::fit(&train_raw, options)?;
    let embedder = HashingEmbedder::new(embed_dim)?;
    let x_train = encode_records(&pipeline, &embedder, &train_raw)?;
    let x_test = encode_records(&pipeline, &embedder, &test_raw)?;

    let outcome = ModelTrainer::run(config.clone(), x_train, y_train.clone())?;

    let bootstrap = BootstrapConfig {
        n_resamples: config.n_bootstrap,
        seed: config.bootstrap_seed,
    };
    let comparison = compare_with_baseline(&outcome.model, &y_train, &x_test, &y_test, &bootstrap)?;

    let bundle = ModelBundle::new(pipeline, outcome.model, Box::new(embedder))?;
    Ok(TrainRun {
        bundle,
        best: outcome.best,
        trials: outcome.trials,
        comparison,
        n_train: y_train.len(),
        n_test: y_test.len(),
    })
}

/// Outputs of evaluating a saved bundle on labeled data.
#[derive(Debug, Clone)]
pub struct EvalRun {
    pub report: BootstrapReport,
    pub rows: Vec<PredictionRow>,
}

pub fn run_evaluation(
    bundle: &ModelBundle,
    records: &[LabeledRecord],
    config: &BootstrapConfig,
) -> Result<EvalRun, AppError> {
    let raw: Vec<RawRecord> = records.iter().map(|r| r.record.clone()).collect();
    let y: Vec<f64> = records.iter().map(|r| r.salary).collect();

    let x = bundle.feature_matrix(&raw)?;
    let pred = bundle.model().predict_matrix(&x)?;
    let report = bootstrap_metrics(&y, &pred, config)?;

    let rows = y
        .iter()
        .zip(&pred)
        .map(|(&actual, &predicted)| PredictionRow::new(actual, predicted))
        .collect();
    Ok(EvalRun { report, rows })
}

fn gather(records: &[LabeledRecord], idx: &[usize]) -> (Vec<RawRecord>, Vec<f64>) {
    idx.iter()
        .map(|&i| (records[i].record.clone(), records[i].salary))
        .unzip()
}
