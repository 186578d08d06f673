//! End-to-end: train -> save -> load -> serve.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use salary_predictor::app::pipeline::run_training;
use salary_predictor::confidence::{BootstrapConfig, bootstrap_metrics};
use salary_predictor::data::generate_synthetic;
use salary_predictor::domain::{RawRecord, SearchSpace, TrainConfig};
use salary_predictor::error::ErrorKind;
use salary_predictor::features::PipelineOptions;
use salary_predictor::io::{MODEL_FILE, load_bundle, save_bundle};
use salary_predictor::models::Regressor;
use salary_predictor::service::{SalaryService, round2};
use serde_json::json;

fn train_into(dir: &Path) {
    let records = generate_synthetic(200, 99).unwrap();
    let config = TrainConfig {
        search_space: SearchSpace {
            n_estimators: (8, 16),
            max_depth: (4, 10),
            min_samples_split: (2, 6),
        },
        n_trials: 3,
        n_folds: 3,
        search_seed: Some(4),
        n_bootstrap: 100,
        bootstrap_seed: Some(4),
        ..TrainConfig::default()
    };
    let run = run_training(&records, &config, &PipelineOptions::default(), 128).unwrap();
    save_bundle(&run.bundle, dir).unwrap();
}

fn loaded_service(dir: &Path) -> SalaryService {
    SalaryService::new(Arc::new(load_bundle(dir).unwrap()))
}

fn analyst_request_body() -> serde_json::Value {
    json!({
        "age": 30,
        "gender": "Male",
        "education_level": "Bachelor's",
        "job_title": "Data Analyst",
        "years_of_experience": 5,
        "description": "Experienced analyst with SQL skills"
    })
}

#[test]
fn prediction_has_rounded_ten_percent_band() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path());
    let svc = loaded_service(dir.path());

    let resp = svc.predict_json(&analyst_request_body()).unwrap();
    assert!(resp.predicted_salary > 0.0);

    let record = RawRecord {
        age: Some(30.0),
        gender: Some("Male".into()),
        education_level: Some("Bachelor's".into()),
        job_title: Some("Data Analyst".into()),
        years_of_experience: Some(5.0),
        description: Some("Experienced analyst with SQL skills".into()),
    };
    let raw = svc.bundle().predict(&record).unwrap().point_estimate;
    assert_eq!(resp.predicted_salary, round2(raw));
    assert_eq!(resp.confidence_interval, [round2(raw * 0.9), round2(raw * 1.1)]);
}

#[test]
fn missing_field_is_a_client_error_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path());
    let svc = loaded_service(dir.path());

    let mut body = analyst_request_body();
    body.as_object_mut().unwrap().remove("job_title");
    let err = svc.predict_json(&body).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);

    // The service keeps answering afterwards.
    assert!(svc.predict_json(&analyst_request_body()).is_ok());
}

#[test]
fn health_reports_persisted_width() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path());
    let svc = loaded_service(dir.path());

    let health = svc.health().unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.features_expected, svc.bundle().model().n_features());
    assert_eq!(health.features_expected, svc.bundle().pipeline().width() + 128);
}

#[test]
fn corrupt_model_refuses_to_load() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path());
    fs::write(dir.path().join(MODEL_FILE), b"{ not json").unwrap();

    let err = load_bundle(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoadError);
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn single_sample_bootstrap_has_point_bands_and_no_r2() {
    let report = bootstrap_metrics(
        &[72_000.0],
        &[70_500.0],
        &BootstrapConfig {
            n_resamples: 1000,
            seed: None,
        },
    )
    .unwrap();
    assert!(report.r2.is_none());
    assert_eq!(report.r2_undefined_resamples, 1000);
    assert_eq!(report.rmse.lower, report.rmse.upper);
    assert_eq!(report.mae.lower, report.mae.upper);
    assert_eq!(report.rmse.lower, 1_500.0);
}

#[test]
fn missing_description_matches_empty_description() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path());
    let bundle = load_bundle(dir.path()).unwrap();

    let base = RawRecord {
        age: Some(41.0),
        gender: Some("Female".into()),
        education_level: Some("Master's".into()),
        job_title: Some("Product Manager".into()),
        years_of_experience: Some(12.0),
        description: None,
    };
    let with_empty = RawRecord {
        description: Some(String::new()),
        ..base.clone()
    };
    assert_eq!(bundle.features(&base).unwrap(), bundle.features(&with_empty).unwrap());
    assert_eq!(bundle.predict(&base).unwrap(), bundle.predict(&with_empty).unwrap());
}

#[test]
fn feature_width_is_constant_across_inputs() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path());
    let bundle = load_bundle(dir.path()).unwrap();
    let width = bundle.layout().total_width();

    let inputs = [
        RawRecord::default(),
        RawRecord {
            job_title: Some("Astronaut".into()),
            description: Some("a very long description ".repeat(50)),
            ..RawRecord::default()
        },
        generate_synthetic(1, 5).unwrap()[0].record.clone(),
    ];
    for r in &inputs {
        assert_eq!(bundle.features(r).unwrap().width(), width);
    }
}
