//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the training and evaluation code stays free of `println!`
//! - output changes are localized

use crate::confidence::{BootstrapReport, MetricBand};
use crate::domain::TrialResult;
use crate::io::ingest::IngestedData;
use crate::training::ComparisonReport;

/// Rows read/used/skipped plus the per-column missing-value table.
pub fn format_ingest_summary(ingest: &IngestedData) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Rows: read={} | used={} | skipped={}\n",
        ingest.rows_read,
        ingest.rows_used(),
        ingest.row_errors.len()
    ));
    for e in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... and {} more\n", ingest.row_errors.len() - 5));
    }

    out.push_str(&format!("\n{:<22} {:>9} {:>9}\n", "column", "missing", "pct"));
    out.push_str(&format!("{:-<22} {:-<9} {:-<9}\n", "", "", ""));
    for c in &ingest.missing.columns {
        out.push_str(&format!("{:<22} {:>9} {:>8.2}%\n", c.column, c.count, c.percentage));
    }
    out.push_str(&format!(
        "Rows with any missing value: {:.2}%\n",
        ingest.missing.rows_with_missing_pct
    ));

    out
}

/// Trials ordered best-first; the chosen one is starred.
pub fn format_search_summary(trials: &[TrialResult], best: &TrialResult, top_n: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!("Hyperparameter search: {} trials\n", trials.len()));
    out.push_str(&format!(
        "  {:>5} {:>12} {:>9} {:>17} {:>14}\n",
        "trial", "n_estimators", "max_depth", "min_samples_split", "cv_rmse"
    ));

    let mut sorted: Vec<&TrialResult> = trials.iter().collect();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.trial.cmp(&b.trial)));
    for t in sorted.into_iter().take(top_n) {
        let chosen = if t.trial == best.trial { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:>5} {:>12} {:>9} {:>17} {:>14.2}\n",
            t.trial, t.params.n_estimators, t.params.max_depth, t.params.min_samples_split, -t.score
        ));
    }

    out
}

/// One model's bootstrap bands.
pub fn format_bootstrap(label: &str, report: &BootstrapReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{label} (n={}, {} resamples, 95% percentile bands)\n",
        report.n, report.n_resamples
    ));
    out.push_str(&format!("  RMSE: {}\n", fmt_band(&report.rmse)));
    out.push_str(&format!("  MAE : {}\n", fmt_band(&report.mae)));
    out.push_str(&format!("  R²  : {}\n", fmt_r2(report)));
    out
}

/// Model and baseline side by side. Acceptance is left to the reader.
pub fn format_comparison(cmp: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str(&format_bootstrap(&cmp.model_type, &cmp.model));
    out.push_str(&format_bootstrap("Baseline (mean)", &cmp.baseline));
    out.push_str(&format!(
        "RMSE bands overlap: {} | MAE bands overlap: {}\n",
        yes_no(cmp.rmse_overlaps()),
        yes_no(cmp.mae_overlaps())
    ));
    out
}

fn fmt_band(band: &MetricBand) -> String {
    format!("[{:.2}, {:.2}]", band.lower, band.upper)
}

fn fmt_r2(report: &BootstrapReport) -> String {
    match &report.r2 {
        Some(band) if report.r2_undefined_resamples == 0 => format!("[{:.4}, {:.4}]", band.lower, band.upper),
        Some(band) => format!(
            "[{:.4}, {:.4}] ({} of {} resamples undefined)",
            band.lower, band.upper, report.r2_undefined_resamples, report.n_resamples
        ),
        None => "undefined".to_string(),
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}
