//! Integration tests for the fitcheck HTTP surface

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use fitcheck_classifiers::{
    ArtifactDir, ClassifierArtifact, ForestParams, RandomForest, SchemaRegistry,
};
use fitcheck_core::FitLabel;
use fitcheck_server::{create_router, AppState, ServerConfig};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::{json, Value};
use std::path::Path;
use tower::ServiceExt;

fn metrics_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Train a small forest per category and write its artifact into `dir`
fn write_models(dir: &Path, categories: &[&str]) {
    let registry = SchemaRegistry::standard();
    let artifacts = ArtifactDir::new(dir);
    let offsets = [8.0, 3.0, 0.0, -3.0, -8.0];

    for category in categories {
        let schema = registry.schema(category).unwrap();
        let width = schema.len();

        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..50 {
            let base = 70.0 + i as f64;
            let offset = offsets[i % offsets.len()];
            // User columns come first in every schema, product columns second.
            let mut row = vec![base; width];
            for value in row.iter_mut().skip(width / 2) {
                *value = base - offset;
            }
            x.push(row);
            y.push(FitLabel::from_difference(offset).to_string());
        }

        let params = ForestParams::default().with_n_estimators(10);
        let model = RandomForest::fit(&params, &x, &y).unwrap();
        artifacts
            .save(&ClassifierArtifact::new(schema, model, x.len()))
            .unwrap();
    }
}

fn app_with(categories: &[&str]) -> Router {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path(), categories);

    let config = ServerConfig {
        models_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    create_router(AppState::load(config, metrics_handle()).unwrap())
}

fn full_app() -> Router {
    app_with(&["upper_fitted", "upper_loose", "lower_fitted", "lower_loose", "dresses"])
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_predict(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_lists_loaded_models() {
    for uri in ["/", "/health"] {
        let (status, body) = send(full_app(), get(uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Healthy");
        assert_eq!(
            body["loaded_models"],
            json!(["upper_fitted", "upper_loose", "lower_fitted", "lower_loose", "dresses"])
        );
    }
}

#[tokio::test]
async fn test_predict_upper_fitted() {
    let (status, body) = send(
        full_app(),
        post_predict(json!({
            "user_profile": {"user_bust_cm": 90, "user_waist_cm": 70},
            "product_details": {
                "fit_category": "upper_fitted",
                "product_chest_cm": 92,
                "product_waist_cm": 71
            }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_used"], "upper_fitted");

    let probabilities = body["probabilities"].as_object().unwrap();
    assert_eq!(probabilities.len(), 5);
    let total: f64 = probabilities.values().map(|p| p.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-6);

    let predicted = body["predicted_fit"].as_str().unwrap();
    assert!(probabilities.contains_key(predicted));
}

#[tokio::test]
async fn test_missing_feature_is_422() {
    let (status, body) = send(
        full_app(),
        post_predict(json!({
            "user_profile": {"user_waist_cm": 72.0, "user_hip_cm": null},
            "product_details": {
                "fit_category": "lower_loose",
                "product_waist_cm": 74.0,
                "product_hip_cm": 100.0
            }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "missing_feature");
    assert_eq!(body["error"]["feature"], "user_hip_cm");
    assert_eq!(body["error"]["category"], "lower_loose");
}

#[tokio::test]
async fn test_unknown_category_is_400() {
    let (status, body) = send(
        app_with(&["upper_loose", "dresses"]),
        post_predict(json!({
            "user_profile": {},
            "product_details": {"fit_category": "unknown_category"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_category");
    assert_eq!(body["error"]["available_models"], json!(["upper_loose", "dresses"]));
}

#[tokio::test]
async fn test_misplaced_measurement_is_not_used() {
    // upper_loose needs user_bust_cm and product_chest_cm; the chest is on the wrong side.
    let (status, body) = send(
        full_app(),
        post_predict(json!({
            "user_profile": {"user_bust_cm": 90.0, "product_chest_cm": 92.0},
            "product_details": {"fit_category": "upper_loose"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(body.get("predicted_fit").is_none());

    let (status, body) = send(
        full_app(),
        post_predict(json!({
            "user_profile": {"user_bust_cm": 90.0},
            "product_details": {"fit_category": "upper_loose"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "missing_feature");
    assert_eq!(body["error"]["feature"], "product_chest_cm");
}

#[tokio::test]
async fn test_unrelated_field_is_422() {
    let (status, body) = send(
        full_app(),
        post_predict(json!({
            "user_profile": {"user_bust_cm": 90.0, "shoe_size": 41},
            "product_details": {"fit_category": "upper_loose", "product_chest_cm": 92.0}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("shoe_size"));
}

#[tokio::test]
async fn test_malformed_bodies_are_rejected() {
    let non_numeric = post_predict(json!({
        "user_profile": {"user_bust_cm": "ninety"},
        "product_details": {"fit_category": "upper_loose", "product_chest_cm": 92.0}
    }));
    let (status, body) = send(full_app(), non_numeric).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let no_category = post_predict(json!({
        "user_profile": {},
        "product_details": {"product_chest_cm": 92.0}
    }));
    let (status, _) = send(full_app(), no_category).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let not_json = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from("{ nope"))
        .unwrap();
    let (status, _) = send(full_app(), not_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path(), &["upper_loose"]);
    let config = ServerConfig {
        models_dir: dir.path().to_path_buf(),
        max_body_bytes: 64,
        ..Default::default()
    };
    let app = create_router(AppState::load(config, metrics_handle()).unwrap());

    let padding = "x".repeat(256);
    let (status, _) = send(
        app,
        post_predict(json!({
            "user_profile": {"user_bust_cm": 90.0},
            "product_details": {"fit_category": "upper_loose", "product_chest_cm": 92.0},
            "note": padding
        })),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (status, body) = send(full_app(), get("/v1/predict")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let response = full_app().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_corrupt_artifact_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path(), &["upper_loose"]);
    std::fs::write(dir.path().join("dresses_model.json"), "[]").unwrap();

    let config = ServerConfig {
        models_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    assert!(AppState::load(config, metrics_handle()).is_err());
}

#[test]
fn test_empty_models_dir_starts_with_nothing_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        models_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let state = AppState::load(config, metrics_handle()).unwrap();
    assert!(state.dispatcher.loaded_categories().is_empty());
}
