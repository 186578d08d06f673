//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during training and serving
//! - persisted inside the model bundle
//! - echoed back in reports

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Age below which nobody is expected to have worked.
///
/// Only used by the soft `years_of_experience <= age - MIN_WORKING_AGE` check.
pub const MIN_WORKING_AGE: f64 = 14.0;

/// One person as described by the raw structured fields plus free text.
///
/// `None` means the value is missing; the feature pipeline imputes it with the
/// rule it learned at fit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub education_level: Option<String>,
    pub job_title: Option<String>,
    pub years_of_experience: Option<f64>,
    pub description: Option<String>,
}

impl RawRecord {
    /// Soft sanity check; violations are reported, never rejected.
    pub fn experience_exceeds_age(&self) -> bool {
        match (self.age, self.years_of_experience) {
            (Some(age), Some(years)) => years > age - MIN_WORKING_AGE,
            _ => false,
        }
    }
}

/// A historical record with its observed salary.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub record: RawRecord,
    pub salary: f64,
}

/// Highest education level, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EducationLevel {
    HighSchool,
    Bachelors,
    Masters,
    Phd,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 4] = [
        EducationLevel::HighSchool,
        EducationLevel::Bachelors,
        EducationLevel::Masters,
        EducationLevel::Phd,
    ];

    /// Parse the spellings found in salary surveys ("Bachelor's", "Bachelor's Degree", "phD", ...).
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "highschool" => Some(EducationLevel::HighSchool),
            "bachelors" | "bachelorsdegree" | "bachelor" | "ba" | "bs" | "bsc" => Some(EducationLevel::Bachelors),
            "masters" | "mastersdegree" | "master" | "ma" | "ms" | "msc" => Some(EducationLevel::Masters),
            "phd" | "doctorate" => Some(EducationLevel::Phd),
            _ => None,
        }
    }

    /// Ordinal code used as the tabular feature value.
    pub fn code(self) -> f64 {
        match self {
            EducationLevel::HighSchool => 0.0,
            EducationLevel::Bachelors => 1.0,
            EducationLevel::Masters => 2.0,
            EducationLevel::Phd => 3.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EducationLevel::HighSchool => "High School",
            EducationLevel::Bachelors => "Bachelor's",
            EducationLevel::Masters => "Master's",
            EducationLevel::Phd => "PhD",
        }
    }
}

/// Output of the tabular preprocessing step for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularBlock(pub Vec<f64>);

/// Output of the text encoder for one description.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock(pub Vec<f64>);

/// `[TabularBlock | TextBlock]`, the only shape the regressor accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub Vec<f64>);

impl TabularBlock {
    pub fn width(&self) -> usize {
        self.0.len()
    }
}

impl TextBlock {
    pub fn width(&self) -> usize {
        self.0.len()
    }
}

impl FeatureVector {
    pub fn zeros(width: usize) -> Self {
        Self(vec![0.0; width])
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Point estimate plus the serving-time band around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub point_estimate: f64,
    pub interval: (f64, f64),
}

/// How many candidate features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// Every feature (the usual default for regression forests).
    All,
    /// `sqrt(n_features)`.
    Sqrt,
    /// `n_features / 3`.
    Third,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Third => n_features / 3,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters proposed by the search for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

/// Inclusive integer ranges explored by the hyperparameter search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub n_estimators: (usize, usize),
    pub max_depth: (usize, usize),
    pub min_samples_split: (usize, usize),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            n_estimators: (100, 1000),
            max_depth: (3, 15),
            min_samples_split: (2, 20),
        }
    }
}

/// Score of one candidate parameter set. Exists only while the search runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub trial: usize,
    pub params: ForestParams,
    /// Mean negative RMSE over the validation folds (higher is better).
    pub score: f64,
    pub fold_scores: Vec<f64>,
}

/// Everything the training run needs to know, derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub search_space: SearchSpace,
    pub n_trials: usize,
    pub n_folds: usize,
    /// Seeds the forest's bagging and feature subsampling.
    pub model_seed: u64,
    /// Seeds the search sampler; `None` draws from OS entropy.
    pub search_seed: Option<u64>,
    pub max_features: MaxFeatures,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub n_bootstrap: usize,
    pub bootstrap_seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            search_space: SearchSpace::default(),
            n_trials: 25,
            n_folds: 5,
            model_seed: 42,
            search_seed: None,
            max_features: MaxFeatures::All,
            test_fraction: 0.2,
            split_seed: 42,
            n_bootstrap: 1000,
            bootstrap_seed: None,
        }
    }
}
