//! Request/response operations, independent of the HTTP transport.
//!
//! `SalaryService` owns a shared, read-only `ModelBundle`. Every call works on its
//! own copies of the request data, so concurrent calls need no locking and one
//! failed request cannot affect another.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::domain::{PredictionResult, RawRecord};
use crate::error::AppError;
use crate::io::{MODEL_VERSION, ModelBundle};
use crate::models::Regressor;

/// Body of `POST /predict`. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub age: f64,
    pub gender: String,
    pub education_level: String,
    pub job_title: String,
    pub years_of_experience: f64,
    pub description: String,
}

impl From<&PredictRequest> for RawRecord {
    fn from(req: &PredictRequest) -> Self {
        RawRecord {
            age: Some(req.age),
            gender: Some(req.gender.clone()),
            education_level: Some(req.education_level.clone()),
            job_title: Some(req.job_title.clone()),
            years_of_experience: Some(req.years_of_experience),
            description: Some(req.description.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_salary: f64,
    pub confidence_interval: [f64; 2],
}

impl From<PredictionResult> for PredictResponse {
    fn from(p: PredictionResult) -> Self {
        Self {
            predicted_salary: round2(p.point_estimate),
            confidence_interval: [round2(p.interval.0), round2(p.interval.1)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub model_version: String,
    pub model_type: String,
    pub features_expected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    pub method: String,
    pub description: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub message: String,
    pub description: String,
    pub version: String,
    pub endpoints: BTreeMap<String, EndpointInfo>,
}

#[derive(Debug, Clone)]
pub struct SalaryService {
    bundle: Arc<ModelBundle>,
}

impl SalaryService {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Validate an untyped JSON body, then predict.
    pub fn predict_json(&self, body: &Value) -> Result<PredictResponse, AppError> {
        let request = PredictRequest::deserialize(body)
            .map_err(|e| AppError::schema(format!("Invalid request body: {e}")))?;
        self.predict(&request)
    }

    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, AppError> {
        let record = RawRecord::from(request);
        self.bundle
            .predict(&record)
            .map(PredictResponse::from)
            .inspect_err(|e| error!("Prediction failed: {e}"))
    }

    /// Zero-vector smoke test: the model is loaded and callable, nothing more.
    pub fn health(&self) -> Result<HealthReport, AppError> {
        let model = self.bundle.model();
        self.bundle
            .smoke_test()
            .inspect_err(|e| error!("Health check failed: {e}"))?;
        Ok(HealthReport {
            status: "healthy".to_string(),
            model_version: MODEL_VERSION.to_string(),
            model_type: model.model_type().to_string(),
            features_expected: model.n_features(),
        })
    }

    pub fn info(&self) -> ServiceInfo {
        let endpoint = |method: &str, description: &str| EndpointInfo {
            method: method.to_string(),
            description: description.to_string(),
        };
        ServiceInfo {
            message: "Salary Prediction API".to_string(),
            description: "Predict salaries based on demographic and professional information".to_string(),
            version: MODEL_VERSION.to_string(),
            endpoints: BTreeMap::from([
                ("/predict".to_string(), endpoint("POST", "Make salary predictions")),
                ("/health".to_string(), endpoint("GET", "Check API health status")),
            ]),
        }
    }
}

/// Round half away from zero to 2 decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::run_training;
    use crate::data::generate_synthetic;
    use crate::domain::{SearchSpace, TrainConfig};
    use crate::error::ErrorKind;
    use crate::features::PipelineOptions;
    use serde_json::json;

    fn service() -> SalaryService {
        let records = generate_synthetic(60, 3).unwrap();
        let config = TrainConfig {
            search_space: SearchSpace {
                n_estimators: (4, 6),
                max_depth: (3, 5),
                min_samples_split: (2, 4),
            },
            n_trials: 2,
            n_folds: 3,
            search_seed: Some(1),
            n_bootstrap: 50,
            bootstrap_seed: Some(1),
            ..TrainConfig::default()
        };
        let run = run_training(&records, &config, &PipelineOptions::default(), 32).unwrap();
        SalaryService::new(Arc::new(run.bundle))
    }

    fn body() -> Value {
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
    fn predict_rounds_and_bands() {
        let svc = service();
        let resp = svc.predict_json(&body()).unwrap();
        assert!(resp.predicted_salary > 0.0);
        assert_eq!(resp.predicted_salary, round2(resp.predicted_salary));
        let [lo, hi] = resp.confidence_interval;
        assert!(lo <= resp.predicted_salary && resp.predicted_salary <= hi);
        assert!((lo - resp.predicted_salary * 0.9).abs() <= 0.02);
        assert!((hi - resp.predicted_salary * 1.1).abs() <= 0.02);
    }

    #[test]
    fn predict_is_deterministic() {
        let svc = service();
        assert_eq!(svc.predict_json(&body()).unwrap(), svc.predict_json(&body()).unwrap());
    }

    #[test]
    fn missing_field_is_schema_mismatch() {
        let svc = service();
        let mut b = body();
        b.as_object_mut().unwrap().remove("job_title");
        let err = svc.predict_json(&b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.message().contains("job_title"));

        let err = svc.predict_json(&json!({"age": "thirty"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn unknown_education_is_a_client_error() {
        let svc = service();
        let mut b = body();
        b["education_level"] = json!("Kindergarten");
        assert_eq!(svc.predict_json(&b).unwrap_err().kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn health_reports_model_width() {
        let svc = service();
        let h = svc.health().unwrap();
        assert_eq!(h.status, "healthy");
        assert_eq!(h.model_version, "1.0.0");
        assert_eq!(h.model_type, "RandomForestRegressor");
        assert_eq!(h.features_expected, svc.bundle().layout().total_width());
    }

    #[test]
    fn info_lists_endpoints() {
        let info = service().info();
        assert!(info.endpoints.contains_key("/predict"));
        assert_eq!(info.endpoints["/health"].method, "GET");
    }

    #[test]
    fn round2_behaves() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(-12.3449), -12.34);
    }
}
