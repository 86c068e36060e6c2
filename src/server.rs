//! HTTP adapter exposing `POST /predict`
//!
//! The request body is a JSON object whose configured feature names form one
//! tabular row. Predictions run on the blocking pool so the async workers are
//! never held by a model call.

use crate::error::InferenceError;
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::ServingMetrics;
use crate::models::InferenceEngine;
use crate::types::PredictionResult;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Shared state for request handlers
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub extractor: FeatureExtractor,
    pub metrics: Arc<ServingMetrics>,
}

impl AppState {
    pub fn new(
        engine: Arc<InferenceEngine>,
        extractor: FeatureExtractor,
        metrics: Arc<ServingMetrics>,
    ) -> Self {
        Self {
            engine,
            extractor,
            metrics,
        }
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict).fallback(method_not_allowed))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Successful prediction body
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub result: PredictionResult,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// API error type that converts to HTTP responses
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not valid JSON (400)
    #[error("Invalid JSON")]
    InvalidJson(#[source] serde_json::Error),

    /// Any method other than POST (405)
    #[error("Invalid HTTP method")]
    MethodNotAllowed,

    /// Error from the model layer; client errors map to 400, the rest to 500
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Prediction task failed to complete (500)
    #[error("Prediction task failed: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Inference(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable name, used as the metrics key
    pub fn kind_name(&self) -> &'static str {
        match self {
            ApiError::InvalidJson(_) => "invalid_json",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::Inference(e) => e.kind_name(),
            ApiError::Internal(_) => "internal",
        }
    }

    /// Message sent to the client; server errors are never detailed
    fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    match run_prediction(&state, &body).await {
        Ok(result) => {
            let latency = started.elapsed();
            state.metrics.record_success(state.engine.kind(), latency);
            debug!(
                request_id = %request_id,
                kind = %state.engine.kind(),
                latency_us = latency.as_micros() as u64,
                "Prediction served"
            );
            Ok(Json(PredictResponse { result }))
        }
        Err(err) => {
            state.metrics.record_error(err.kind_name());
            if err.status_code().is_server_error() {
                error!(request_id = %request_id, error = %err, "Prediction failed");
            } else {
                warn!(request_id = %request_id, error = %err, "Rejected prediction request");
            }
            Err(err)
        }
    }
}

async fn run_prediction(state: &AppState, body: &[u8]) -> Result<PredictionResult, ApiError> {
    let payload: serde_json::Value = serde_json::from_slice(body).map_err(ApiError::InvalidJson)?;
    let row = state.extractor.extract_value(&payload)?;

    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.predict_tabular(row))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(result)
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
