//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fitcheck_classifiers::schema::features;
use fitcheck_classifiers::PredictionRequest;
use fitcheck_core::{Error, ErrorKind, MeasurementRecord, PredictionResult, ServiceStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info_span, warn};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/predict", post(predict))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health report
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub loaded_models: Vec<String>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.dispatcher.health();
    Json(HealthResponse {
        status: health.status,
        loaded_models: health.loaded_categories,
    })
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Body of `POST /predict`
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictRequest {
    pub user_profile: UserProfile,
    pub product_details: ProductDetails,
}

/// Body measurements of the shopper
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserProfile {
    pub user_bust_cm: Option<f64>,
    pub user_waist_cm: Option<f64>,
    pub user_hip_cm: Option<f64>,
}

/// Garment measurements plus the category that selects the model
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductDetails {
    pub fit_category: String,
    #[serde(default)]
    pub product_chest_cm: Option<f64>,
    #[serde(default)]
    pub product_waist_cm: Option<f64>,
    #[serde(default)]
    pub product_hip_cm: Option<f64>,
}

impl From<UserProfile> for MeasurementRecord {
    fn from(profile: UserProfile) -> Self {
        [
            (features::USER_BUST_CM, profile.user_bust_cm),
            (features::USER_WAIST_CM, profile.user_waist_cm),
            (features::USER_HIP_CM, profile.user_hip_cm),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

impl ProductDetails {
    fn measurements(&self) -> MeasurementRecord {
        [
            (features::PRODUCT_CHEST_CM, self.product_chest_cm),
            (features::PRODUCT_WAIST_CM, self.product_waist_cm),
            (features::PRODUCT_HIP_CM, self.product_hip_cm),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

impl From<PredictRequest> for PredictionRequest {
    fn from(body: PredictRequest) -> Self {
        let product = body.product_details.measurements();
        PredictionRequest {
            category: body.product_details.fit_category,
            user: body.user_profile.into(),
            product,
        }
    }
}

/// Body returned by `POST /predict`
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_fit: String,
    pub probabilities: BTreeMap<String, f64>,
    pub model_used: String,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            predicted_fit: result.predicted_label,
            probabilities: result.probabilities,
            model_used: result.category,
        }
    }
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    let Json(body) = payload?;
    let request = PredictionRequest::from(body);

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("predict", %request_id, category = %request.category);

    let started = Instant::now();
    let outcome = span.in_scope(|| state.dispatcher.predict(&request));
    let elapsed_us = started.elapsed().as_micros() as f64;

    // Unloaded categories are caller-controlled strings; keep them out of labels.
    let category_label = if state.dispatcher.loaded_categories().contains(&request.category) {
        request.category.clone()
    } else {
        "unknown".to_string()
    };
    let outcome_label = match &outcome {
        Ok(_) => "ok",
        Err(e) => e.name(),
    };
    metrics::counter!(
        "fitcheck_predictions_total",
        "category" => category_label.clone(),
        "outcome" => outcome_label
    )
    .increment(1);
    metrics::histogram!("fitcheck_prediction_latency_us", "category" => category_label)
        .record(elapsed_us);

    let result = outcome?;
    debug!(
        "Request {} predicted '{}' for '{}' in {}us",
        request_id, result.predicted_label, result.category, elapsed_us
    );
    Ok(Json(result.into()))
}

async fn fallback() -> Response {
    let body = json!({
        "error": {
            "message": "Not found",
            "type": "not_found",
        }
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Error handling
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Prediction(#[from] Error),

    #[error("{message}")]
    InvalidBody { status: StatusCode, message: String },
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InvalidBody { status, message } => {
                warn!("Rejected request body: {}", message);
                (
                    status,
                    json!({
                        "error": {
                            "message": message,
                            "type": "invalid_request_error",
                        }
                    }),
                )
            }
            AppError::Prediction(err) => error_body(err),
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(err: Error) -> (StatusCode, serde_json::Value) {
    match err.kind() {
        ErrorKind::InvalidInput | ErrorKind::Unprocessable => {
            let status = if err.kind() == ErrorKind::InvalidInput {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            let mut body = json!({
                "error": {
                    "message": err.to_string(),
                    "type": err.name(),
                }
            });
            match &err {
                Error::InvalidCategory { available, .. } => {
                    body["error"]["available_models"] = json!(available);
                }
                Error::MissingFeature { feature, category } => {
                    body["error"]["feature"] = json!(feature);
                    body["error"]["category"] = json!(category);
                }
                _ => {}
            }
            (status, body)
        }
        ErrorKind::Internal => {
            // Internal detail stays in the log.
            error!("Prediction failed: {}", err);
            let kind = match err {
                Error::PredictionFailed(_) => "prediction_failed",
                _ => "internal_error",
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": {
                        "message": "Prediction failed",
                        "type": kind,
                    }
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: Error) -> (StatusCode, serde_json::Value) {
        let response = AppError::from(err).into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_category_is_bad_request() {
        let (status, body) = render(Error::InvalidCategory {
            category: "capes".to_string(),
            available: vec!["dresses".to_string()],
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_category");
        assert_eq!(body["error"]["available_models"], json!(["dresses"]));
    }

    #[tokio::test]
    async fn test_missing_feature_is_unprocessable() {
        let (status, body) = render(Error::missing_feature("user_hip_cm", "lower_loose")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["feature"], "user_hip_cm");
        assert_eq!(body["error"]["category"], "lower_loose");
    }

    #[tokio::test]
    async fn test_prediction_failure_is_opaque() {
        let (status, body) = render(Error::prediction_failed("matrix is singular at node 17")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "prediction_failed");
        assert!(!body.to_string().contains("node 17"));
    }

    #[test]
    fn test_product_details_collects_measurements() {
        let body: PredictRequest = serde_json::from_value(json!({
            "user_profile": {"user_bust_cm": 90.0, "user_waist_cm": null},
            "product_details": {"fit_category": "upper_loose", "product_chest_cm": 92.5}
        }))
        .unwrap();

        let request = PredictionRequest::from(body);
        assert_eq!(request.category, "upper_loose");
        assert_eq!(request.user.get("user_bust_cm"), Some(90.0));
        assert!(request.user.contains("user_waist_cm"));
        assert_eq!(request.product.get("product_chest_cm"), Some(92.5));
        assert!(!request.product.contains("fit_category"));
    }

    #[test]
    fn test_non_numeric_measurement_rejected() {
        let result = serde_json::from_value::<PredictRequest>(json!({
            "user_profile": {"user_bust_cm": "ninety"},
            "product_details": {"fit_category": "upper_loose"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_measurements_stay_on_their_own_side() {
        let misplaced = serde_json::from_value::<PredictRequest>(json!({
            "user_profile": {"user_bust_cm": 90.0, "product_chest_cm": 92.0},
            "product_details": {"fit_category": "upper_loose"}
        }));
        assert!(misplaced.is_err());

        let misplaced = serde_json::from_value::<PredictRequest>(json!({
            "user_profile": {},
            "product_details": {"fit_category": "upper_loose", "user_bust_cm": 90.0}
        }));
        assert!(misplaced.is_err());
    }

    #[test]
    fn test_unrelated_fields_rejected() {
        let result = serde_json::from_value::<PredictRequest>(json!({
            "user_profile": {"user_bust_cm": 90.0, "shoe_size": 41},
            "product_details": {"fit_category": "upper_loose", "product_chest_cm": 92.0}
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("shoe_size"), "{err}");
    }

    #[test]
    fn test_absent_measurements_become_nulls() {
        let body: PredictRequest = serde_json::from_value(json!({
            "user_profile": {"user_waist_cm": 72.0},
            "product_details": {"fit_category": "lower_loose", "product_hip_cm": 100.0}
        }))
        .unwrap();

        let request = PredictionRequest::from(body);
        assert_eq!(request.user.len(), 3);
        assert_eq!(request.user.get("user_waist_cm"), Some(72.0));
        assert_eq!(request.user.get("user_hip_cm"), None);
        assert_eq!(request.product.get("product_hip_cm"), Some(100.0));
        assert_eq!(request.product.get("product_waist_cm"), None);
    }
}
