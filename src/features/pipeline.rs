//! Tabular preprocessing: raw structured fields -> fixed-width numeric block.
//!
//! Column order is fixed at fit time and is part of the model contract:
//!
//! 1. `age` (median-imputed, standardized)
//! 2. `years_of_experience` (median-imputed, standardized)
//! 3. `education_level` (ordinal: High School < Bachelor's < Master's < PhD)
//! 4. `gender=<value>` one-hot block, categories sorted
//! 5. `job_title=<value>` one-hot block, categories sorted
//!
//! Every imputation value (medians, modes) is learned by `fit` and stored in the
//! pipeline; `transform` never looks at more than the one record it is given.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EducationLevel, RawRecord, TabularBlock};
use crate::error::{AppError, ErrorKind};
use crate::math::{mean, median, std_dev};

pub const FEATURE_AGE: &str = "age";
pub const FEATURE_EXPERIENCE: &str = "years_of_experience";
pub const FEATURE_EDUCATION: &str = "education_level";
pub const PREFIX_GENDER: &str = "gender=";
pub const PREFIX_JOB_TITLE: &str = "job_title=";

/// Knobs for fitting the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Job titles seen fewer times than this are not given their own column.
    pub min_category_count: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { min_category_count: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericScaler {
    fill: f64,
    mean: f64,
    scale: f64,
}

impl NumericScaler {
    fn fit(name: &str, values: &[Option<f64>]) -> Result<Self, AppError> {
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        let fill = median(&observed).ok_or_else(|| {
            AppError::new(
                ErrorKind::InsufficientData,
                format!("Column '{name}' has no observed values to fit on."),
            )
        })?;
        let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(fill)).collect();
        let mean = mean(&imputed).unwrap_or(fill);
        let sd = std_dev(&imputed).unwrap_or(0.0);
        let scale = if sd > 1e-12 { sd } else { 1.0 };
        Ok(Self { fill, mean, scale })
    }

    fn apply(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.fill) - self.mean) / self.scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OneHot {
    categories: Vec<String>,
    fill: String,
}

impl OneHot {
    fn fit(name: &str, values: &[Option<String>], min_count: usize) -> Result<Self, AppError> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for v in values.iter().filter_map(|v| clean_category(v.as_deref())) {
            *counts.entry(v.to_string()).or_default() += 1;
        }

        // Mode with ties broken by the lexicographically smallest category.
        let mut fill: Option<(&String, usize)> = None;
        for (cat, &n) in &counts {
            if fill.is_none_or(|(_, best)| n > best) {
                fill = Some((cat, n));
            }
        }
        let Some((fill, _)) = fill else {
            return Err(AppError::new(
                ErrorKind::InsufficientData,
                format!("Column '{name}' has no observed values to fit on."),
            ));
        };
        let fill = fill.clone();

        let categories = counts
            .iter()
            .filter(|(_, n)| **n >= min_count.max(1))
            .map(|(c, _)| c.clone())
            .collect();

        Ok(Self { categories, fill })
    }

    fn encode(&self, value: Option<&str>, out: &mut Vec<f64>) {
        let value = clean_category(value).unwrap_or(self.fill.as_str());
        let hit = self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok();
        out.extend((0..self.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
    }
}

fn clean_category(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Fitted tabular preprocessing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    options: PipelineOptions,
    age: NumericScaler,
    experience: NumericScaler,
    education_fill: EducationLevel,
    gender: OneHot,
    job_title: OneHot,
}

impl FeaturePipeline {
    /// Learn scalers, imputation values and category vocabularies from training records.
    pub fn fit(records: &[RawRecord], options: &PipelineOptions) -> Result<Self, AppError> {
        if records.is_empty() {
            return Err(AppError::new(
                ErrorKind::InsufficientData,
                "Cannot fit the feature pipeline on zero records.",
            ));
        }

        let mut ages = Vec::with_capacity(records.len());
        let mut years = Vec::with_capacity(records.len());
        let mut education_counts = [0usize; 4];
        for r in records {
            ages.push(checked_numeric(FEATURE_AGE, r.age)?);
            years.push(checked_numeric(FEATURE_EXPERIENCE, r.years_of_experience)?);
            if let Some(level) = parse_education(r.education_level.as_deref())? {
                education_counts[level.code() as usize] += 1;
            }
        }

        let education_fill = EducationLevel::ALL
            .iter()
            .copied()
            .zip(education_counts)
            .filter(|(_, n)| *n > 0)
            .fold(None::<(EducationLevel, usize)>, |best, (level, n)| match best {
                Some((_, best_n)) if best_n >= n => best,
                _ => Some((level, n)),
            })
            .map(|(level, _)| level)
            .ok_or_else(|| {
                AppError::new(
                    ErrorKind::InsufficientData,
                    "Column 'education_level' has no observed values to fit on.",
                )
            })?;

        let genders: Vec<Option<String>> = records.iter().map(|r| r.gender.clone()).collect();
        let titles: Vec<Option<String>> = records.iter().map(|r| r.job_title.clone()).collect();

        let pipeline = Self {
            options: options.clone(),
            age: NumericScaler::fit(FEATURE_AGE, &ages)?,
            experience: NumericScaler::fit(FEATURE_EXPERIENCE, &years)?,
            education_fill,
            gender: OneHot::fit("gender", &genders, 1)?,
            job_title: OneHot::fit("job_title", &titles, options.min_category_count)?,
        };
        debug!(
            width = pipeline.width(),
            genders = pipeline.gender.categories.len(),
            job_titles = pipeline.job_title.categories.len(),
            "feature pipeline fitted"
        );
        Ok(pipeline)
    }

    /// Encode one record using the fit-time state.
    pub fn transform(&self, record: &RawRecord) -> Result<TabularBlock, AppError> {
        let age = checked_numeric(FEATURE_AGE, record.age)?;
        let years = checked_numeric(FEATURE_EXPERIENCE, record.years_of_experience)?;
        let education = parse_education(record.education_level.as_deref())?.unwrap_or(self.education_fill);
        if record.experience_exceeds_age() {
            debug!(?age, ?years, "years_of_experience exceeds age minus minimum working age");
        }

        let mut out = Vec::with_capacity(self.width());
        out.push(self.age.apply(age));
        out.push(self.experience.apply(years));
        out.push(education.code());
        self.gender.encode(record.gender.as_deref(), &mut out);
        self.job_title.encode(record.job_title.as_deref(), &mut out);
        Ok(TabularBlock(out))
    }

    pub fn transform_batch(&self, records: &[RawRecord]) -> Result<Vec<TabularBlock>, AppError> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    pub fn fit_transform(
        records: &[RawRecord],
        options: &PipelineOptions,
    ) -> Result<(Self, Vec<TabularBlock>), AppError> {
        let pipeline = Self::fit(records, options)?;
        let blocks = pipeline.transform_batch(records)?;
        Ok((pipeline, blocks))
    }

    /// Column names in output order. This list is the persisted schema.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec![
            FEATURE_AGE.to_string(),
            FEATURE_EXPERIENCE.to_string(),
            FEATURE_EDUCATION.to_string(),
        ];
        names.extend(self.gender.categories.iter().map(|c| format!("{PREFIX_GENDER}{c}")));
        names.extend(self.job_title.categories.iter().map(|c| format!("{PREFIX_JOB_TITLE}{c}")));
        names
    }

    pub fn width(&self) -> usize {
        3 + self.gender.categories.len() + self.job_title.categories.len()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }
}

fn checked_numeric(name: &str, value: Option<f64>) -> Result<Option<f64>, AppError> {
    match value {
        Some(v) if !v.is_finite() => Err(AppError::schema(format!("Field '{name}' must be a finite number, got {v}."))),
        Some(v) if v < 0.0 => Err(AppError::schema(format!("Field '{name}' must be >= 0, got {v}."))),
        other => Ok(other),
    }
}

fn parse_education(value: Option<&str>) -> Result<Option<EducationLevel>, AppError> {
    let Some(raw) = clean_category(value) else {
        return Ok(None);
    };
    EducationLevel::parse(raw).map(Some).ok_or_else(|| {
        let known: Vec<&str> = EducationLevel::ALL.iter().map(|l| l.label()).collect();
        AppError::schema(format!(
            "Field 'education_level' has unknown value '{raw}' (expected one of: {}).",
            known.join(", ")
        ))
    })
}
