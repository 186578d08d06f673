//! CSV ingest for historical salary data.
//!
//! This module turns a salary CSV into `LabeledRecord`s that are safe to train on.
//!
//! Design goals:
//! - **Strict schema** for the seven expected columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Missing is not invalid**: an empty feature cell becomes `None` and is left
//!   to the feature pipeline's imputation; only the target must be present

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{LabeledRecord, RawRecord};
use crate::error::{AppError, ErrorKind};

pub const COL_AGE: &str = "Age";
pub const COL_GENDER: &str = "Gender";
pub const COL_EDUCATION: &str = "Education Level";
pub const COL_JOB_TITLE: &str = "Job Title";
pub const COL_EXPERIENCE: &str = "Years of Experience";
pub const COL_DESCRIPTION: &str = "Description";
pub const COL_SALARY: &str = "Salary";

/// Expected columns, in the order `write_dataset_csv` emits them.
pub const DATASET_COLUMNS: [&str; 7] = [
    COL_AGE,
    COL_GENDER,
    COL_EDUCATION,
    COL_JOB_TITLE,
    COL_EXPERIENCE,
    COL_DESCRIPTION,
    COL_SALARY,
];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMissing {
    pub column: String,
    pub count: usize,
    /// Share of rows, in percent, rounded to 2 decimals.
    pub percentage: f64,
}

/// Missing-value summary over every row the CSV reader could parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingReport {
    pub rows: usize,
    pub columns: Vec<ColumnMissing>,
    /// Percent of rows with at least one empty cell.
    pub rows_with_missing_pct: f64,
}

/// Ingest output: training records + row errors + missing-data summary.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub records: Vec<LabeledRecord>,
    pub row_errors: Vec<RowError>,
    pub missing: MissingReport,
    pub rows_read: usize,
}

impl IngestedData {
    pub fn rows_used(&self) -> usize {
        self.records.len()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.salary).collect()
    }
}

/// Load a salary CSV from disk.
pub fn load_dataset(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_dataset(file)
}

/// Parse a salary CSV from any reader.
pub fn read_dataset<R: Read>(input: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::schema(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_columns_exist(&header_map)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut missing_counts = [0usize; DATASET_COLUMNS.len()];
    let mut rows_with_missing = 0usize;
    let mut rows_parsed = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, and CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        rows_parsed += 1;
        let mut any_missing = false;
        for (i, col) in DATASET_COLUMNS.iter().enumerate() {
            if get_cell(&record, &header_map, col).is_none() {
                missing_counts[i] += 1;
                any_missing = true;
            }
        }
        if any_missing {
            rows_with_missing += 1;
        }

        match parse_row(&record, &header_map) {
            Ok(row) => {
                if row.record.experience_exceeds_age() {
                    debug!(line, "years of experience exceeds age minus working age");
                }
                records.push(row);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), "rows skipped during ingest");
    }
    if records.is_empty() {
        return Err(AppError::new(
            ErrorKind::InsufficientData,
            "No valid rows remain after ingest.",
        ));
    }

    let missing = MissingReport {
        rows: rows_parsed,
        columns: DATASET_COLUMNS
            .iter()
            .zip(missing_counts)
            .map(|(col, count)| ColumnMissing {
                column: col.to_string(),
                count,
                percentage: round2(pct(count, rows_parsed)),
            })
            .collect(),
        rows_with_missing_pct: pct(rows_with_missing, rows_parsed),
    };

    Ok(IngestedData {
        records,
        row_errors,
        missing,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    let missing: Vec<&str> = DATASET_COLUMNS
        .iter()
        .copied()
        .filter(|col| !header_map.contains_key(&normalize_header_name(col)))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::schema(format!(
            "CSV is missing required column(s): {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<LabeledRecord, String> {
    let salary = match get_cell(record, header_map, COL_SALARY) {
        Some(s) => parse_non_negative(COL_SALARY, s)?,
        None => return Err("Missing Salary.".to_string()),
    };

    let age = get_cell(record, header_map, COL_AGE)
        .map(|s| parse_non_negative(COL_AGE, s))
        .transpose()?;
    let years = get_cell(record, header_map, COL_EXPERIENCE)
        .map(|s| parse_non_negative(COL_EXPERIENCE, s))
        .transpose()?;
    let text = |col: &str| get_cell(record, header_map, col).map(str::to_string);

    Ok(LabeledRecord {
        record: RawRecord {
            age,
            gender: text(COL_GENDER),
            education_level: text(COL_EDUCATION),
            job_title: text(COL_JOB_TITLE),
            years_of_experience: years,
            description: text(COL_DESCRIPTION),
        },
        salary,
    })
}

fn get_cell<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = *header_map.get(&normalize_header_name(name))?;
    record.get(idx).filter(|s| !s.is_empty())
}

fn parse_non_negative(col: &str, s: &str) -> Result<f64, String> {
    let v: f64 = s
        .parse()
        .map_err(|_| format!("{col} is not a number: '{s}'"))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("{col} must be a finite, non-negative number (got {s})."));
    }
    Ok(v)
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Age,Gender,Education Level,Job Title,Years of Experience,Description,Salary\n";

    #[test]
    fn reads_rows_and_maps_empty_cells_to_none() {
        let csv = format!(
            "{HEADER}32,Male,Bachelor's,Software Engineer,5,Builds APIs,90000\n\
             28,,Master's,Data Analyst,,,65000\n"
        );
        let data = read_dataset(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_used(), 2);
        assert_eq!(data.targets(), vec![90_000.0, 65_000.0]);
        let second = &data.records[1].record;
        assert_eq!(second.gender, None);
        assert_eq!(second.years_of_experience, None);
        assert_eq!(second.description, None);
        assert_eq!(second.job_title.as_deref(), Some("Data Analyst"));
    }

    #[test]
    fn bad_salary_rows_are_skipped_with_line_numbers() {
        let csv = format!(
            "{HEADER}32,Male,PhD,Scientist,5,x,\n\
             40,Female,PhD,Director,15,y,abc\n\
             41,Female,PhD,Director,16,z,150000\n"
        );
        let data = read_dataset(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_used(), 1);
        assert_eq!(data.rows_read, 3);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let csv = "Age,Gender,Education Level,Years of Experience,Description,Salary\n30,Male,PhD,3,x,1\n";
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.message().contains("Job Title"));
    }

    #[test]
    fn headers_are_matched_loosely() {
        let csv = "\u{feff}age , GENDER,education level,Job Title,years of experience,description,salary\n\
                   30,Male,PhD,Scientist,3,x,100000\n";
        assert_eq!(read_dataset(csv.as_bytes()).unwrap().rows_used(), 1);
    }

    #[test]
    fn missing_report_counts_per_column_and_per_row() {
        let csv = format!(
            "{HEADER}32,,Bachelor's,Engineer,5,,90000\n\
             28,Female,Master's,Analyst,3,text,65000\n\
             30,Male,,Analyst,4,text,70000\n\
             35,Male,PhD,Lead,9,text,120000\n"
        );
        let data = read_dataset(csv.as_bytes()).unwrap();
        let m = &data.missing;
        assert_eq!(m.rows, 4);
        let gender = m.columns.iter().find(|c| c.column == COL_GENDER).unwrap();
        assert_eq!(gender.count, 1);
        assert_eq!(gender.percentage, 25.0);
        assert_eq!(m.rows_with_missing_pct, 50.0);
    }

    #[test]
    fn all_rows_invalid_is_insufficient_data() {
        let csv = format!("{HEADER}32,Male,PhD,Scientist,5,x,\n");
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }
}
