//! HTTP binding (axum).
//!
//! | Route | Success | Failure |
//! |---|---|---|
//! | `POST /predict` | 200 `PredictResponse` | 400 `{"detail": msg}` |
//! | `GET /health` | 200 `HealthReport` | 500 `{"detail": msg}` |
//! | `GET /` | 200 `ServiceInfo` | |
//!
//! The body of `/predict` is taken as raw bytes so a malformed or incomplete
//! payload yields the same 400 shape as a pipeline error. Inference is CPU-bound
//! and runs on the blocking pool.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::error::AppError;
use crate::service::handlers::SalaryService;

pub fn router(service: Arc<SalaryService>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .with_state(service)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(service: Arc<SalaryService>, addr: &str) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::io(format!("Failed to bind {addr}: {e}")))?;
    info!("Salary prediction API listening on {addr}");
    axum::serve(listener, router(service))
        .await
        .map_err(|e| AppError::io(format!("Server error: {e}")))
}

async fn root_handler(State(service): State<Arc<SalaryService>>) -> impl IntoResponse {
    Json(service.info())
}

async fn health_handler(State(service): State<Arc<SalaryService>>) -> Response {
    let result = tokio::task::spawn_blocking(move || service.health()).await;
    match result {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(e)) => detail(StatusCode::INTERNAL_SERVER_ERROR, e.message()),
        Err(e) => {
            error!("Health check failed: {e}");
            detail(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn predict_handler(State(service): State<Arc<SalaryService>>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            error!("Prediction failed: {e}");
            return detail(StatusCode::BAD_REQUEST, &format!("Invalid JSON body: {e}"));
        }
    };

    let result = tokio::task::spawn_blocking(move || service.predict_json(&value)).await;
    match result {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => detail(StatusCode::BAD_REQUEST, e.message()),
        Err(e) => {
            error!("Prediction failed: {e}");
            detail(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}
