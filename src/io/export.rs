//! CSV exports.
//!
//! - per-row test-set predictions for `evaluate --export`
//! - whole datasets (what `synth` writes, in the same layout ingest reads)

use std::path::Path;

use serde::Serialize;

use crate::domain::LabeledRecord;
use crate::error::AppError;
use crate::io::ingest::DATASET_COLUMNS;

/// One evaluated row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionRow {
    pub actual: f64,
    pub predicted: f64,
    pub residual: f64,
}

impl PredictionRow {
    pub fn new(actual: f64, predicted: f64) -> Self {
        Self {
            actual,
            predicted,
            residual: actual - predicted,
        }
    }
}

/// Write `actual,predicted,residual` rows.
pub fn write_predictions_csv(path: &Path, rows: &[PredictionRow]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write labeled records with the ingest header; `None` becomes an empty cell.
pub fn write_dataset_csv(path: &Path, records: &[LabeledRecord]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create dataset CSV '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::io(format!("Failed to write dataset CSV: {e}"));

    writer.write_record(DATASET_COLUMNS).map_err(write_err)?;
    for r in records {
        let rec = &r.record;
        let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        writer
            .write_record([
                num(rec.age),
                rec.gender.clone().unwrap_or_default(),
                rec.education_level.clone().unwrap_or_default(),
                rec.job_title.clone().unwrap_or_default(),
                num(rec.years_of_experience),
                rec.description.clone().unwrap_or_default(),
                r.salary.to_string(),
            ])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush dataset CSV: {e}")))?;
    Ok(())
}
