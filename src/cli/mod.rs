//! Command-line parsing for the salary predictor.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling code: every args struct converts into plain library
//! types, so nothing below `app` depends on clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::confidence::BootstrapConfig;
use crate::domain::{MaxFeatures, SearchSpace, TrainConfig};
use crate::features::{DEFAULT_EMBED_DIM, PipelineOptions};
use crate::service::PredictRequest;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "salary", version, about = "Salary prediction: training, evaluation and serving")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search hyperparameters, refit, compare against a mean baseline and save a bundle.
    Train(TrainArgs),
    /// Bootstrap RMSE/MAE/R² of a saved bundle on a labeled CSV.
    Evaluate(EvaluateArgs),
    /// Predict one salary and print the response JSON.
    Predict(PredictArgs),
    /// Serve `/predict`, `/health` and `/` over HTTP.
    Serve(ServeArgs),
    /// Write a seeded synthetic training CSV.
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct TrainArgs {
    /// Training CSV (Age, Gender, Education Level, Job Title, Years of Experience, Description, Salary).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Directory the model bundle is written to.
    #[arg(long, env = "SALARY_ARTIFACTS", default_value = "artifacts")]
    pub out: PathBuf,

    /// Number of hyperparameter search trials.
    #[arg(long, default_value_t = 25)]
    pub trials: usize,

    /// Cross-validation folds per trial.
    #[arg(long, default_value_t = 5)]
    pub folds: usize,

    /// Seed for the forest's bagging and feature subsampling.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Seed for the search sampler (unseeded by default).
    #[arg(long)]
    pub search_seed: Option<u64>,

    /// Share of rows held out for the baseline comparison.
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Seed for the train/test shuffle.
    #[arg(long, default_value_t = 42)]
    pub split_seed: u64,

    /// Bootstrap resamples for the comparison.
    #[arg(long, default_value_t = 1000)]
    pub bootstrap: usize,

    /// Seed for bootstrap resampling (unseeded by default).
    #[arg(long)]
    pub bootstrap_seed: Option<u64>,

    /// Job titles seen fewer times than this share one all-zero encoding.
    #[arg(long, default_value_t = 1)]
    pub min_category_count: usize,

    /// Width of the hashed text embedding.
    #[arg(long, default_value_t = DEFAULT_EMBED_DIM)]
    pub embed_dim: usize,

    /// Candidate features per split.
    #[arg(long, value_enum, default_value_t = MaxFeatures::All)]
    pub max_features: MaxFeatures,

    #[arg(long, default_value_t = 100)]
    pub n_estimators_min: usize,

    #[arg(long, default_value_t = 1000)]
    pub n_estimators_max: usize,

    #[arg(long, default_value_t = 3)]
    pub max_depth_min: usize,

    #[arg(long, default_value_t = 15)]
    pub max_depth_max: usize,

    #[arg(long, default_value_t = 2)]
    pub min_samples_split_min: usize,

    #[arg(long, default_value_t = 20)]
    pub min_samples_split_max: usize,

    /// Show the best N trials.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

impl TrainArgs {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            min_category_count: self.min_category_count,
        }
    }
}

impl From<&TrainArgs> for TrainConfig {
    fn from(args: &TrainArgs) -> Self {
        TrainConfig {
            search_space: SearchSpace {
                n_estimators: (args.n_estimators_min, args.n_estimators_max),
                max_depth: (args.max_depth_min, args.max_depth_max),
                min_samples_split: (args.min_samples_split_min, args.min_samples_split_max),
            },
            n_trials: args.trials,
            n_folds: args.folds,
            model_seed: args.seed,
            search_seed: args.search_seed,
            max_features: args.max_features,
            test_fraction: args.test_fraction,
            split_seed: args.split_seed,
            n_bootstrap: args.bootstrap,
            bootstrap_seed: args.bootstrap_seed,
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct EvaluateArgs {
    /// Model bundle directory.
    #[arg(long, env = "SALARY_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Labeled CSV to evaluate on.
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Bootstrap resamples.
    #[arg(long, default_value_t = 1000)]
    pub bootstrap: usize,

    /// Seed for bootstrap resampling (unseeded by default).
    #[arg(long)]
    pub bootstrap_seed: Option<u64>,

    /// Export per-row `actual,predicted,residual` to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl From<&EvaluateArgs> for BootstrapConfig {
    fn from(args: &EvaluateArgs) -> Self {
        BootstrapConfig {
            n_resamples: args.bootstrap,
            seed: args.bootstrap_seed,
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    /// Model bundle directory.
    #[arg(long, env = "SALARY_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,

    #[arg(long)]
    pub age: f64,

    #[arg(long)]
    pub gender: String,

    /// e.g. "Bachelor's", "Master's", "PhD".
    #[arg(long)]
    pub education_level: String,

    #[arg(long)]
    pub job_title: String,

    #[arg(long)]
    pub years_of_experience: f64,

    /// Free-text job description.
    #[arg(long, default_value = "")]
    pub description: String,
}

impl From<&PredictArgs> for PredictRequest {
    fn from(args: &PredictArgs) -> Self {
        PredictRequest {
            age: args.age,
            gender: args.gender.clone(),
            education_level: args.education_level.clone(),
            job_title: args.job_title.clone(),
            years_of_experience: args.years_of_experience,
            description: args.description.clone(),
        }
    }
}

#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// Model bundle directory.
    #[arg(long, env = "SALARY_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Listen address.
    #[arg(long, env = "SALARY_BIND", default_value = "0.0.0.0:8000")]
    pub bind: String,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of rows to generate.
    #[arg(long, default_value_t = 400)]
    pub rows: usize,

    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["salary", "train", "--data", "d.csv", "--out", "out"]).unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train");
        };
        let cfg = TrainConfig::from(&args);
        let def = TrainConfig::default();
        assert_eq!(cfg.search_space, def.search_space);
        assert_eq!(cfg.n_trials, 25);
        assert_eq!(cfg.n_folds, 5);
        assert_eq!(cfg.model_seed, 42);
        assert_eq!(cfg.search_seed, None);
        assert_eq!(cfg.n_bootstrap, 1000);
        assert_eq!(args.embed_dim, DEFAULT_EMBED_DIM);
        assert_eq!(args.pipeline_options(), PipelineOptions::default());
    }

    #[test]
    fn predict_args_become_a_request() {
        let cli = Cli::try_parse_from([
            "salary",
            "predict",
            "--artifacts",
            "a",
            "--age",
            "30",
            "--gender",
            "Male",
            "--education-level",
            "Bachelor's",
            "--job-title",
            "Data Analyst",
            "--years-of-experience",
            "5",
        ])
        .unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        let req = PredictRequest::from(&args);
        assert_eq!(req.age, 30.0);
        assert_eq!(req.description, "");
    }

    #[test]
    fn synth_and_serve_parse() {
        let cli = Cli::try_parse_from(["salary", "synth", "--out", "x.csv", "--rows", "10"]).unwrap();
        assert!(matches!(cli.command, Command::Synth(SynthArgs { rows: 10, seed: 7, .. })));
        let cli = Cli::try_parse_from(["salary", "serve", "--artifacts", "a", "--bind", "127.0.0.1:9000"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind, "127.0.0.1:9000");
    }
}
