//! Category-dispatched prediction
//!
//! Each request resolves its category against the loaded store, merges user and
//! product measurements, projects them onto the category schema and asks the
//! bound classifier for a label and probabilities. Faults raised inside the
//! classifier, including panics, are converted to
//! [`Error::PredictionFailed`] so that one bad request never takes the service
//! down.

use crate::classifier::FitClassifier;
use crate::schema::SchemaRegistry;
use crate::store::ClassifierStore;
use fitcheck_core::{
    Error, HealthStatus, MeasurementRecord, PredictionResult, Result, ServiceStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Tolerance when checking that probabilities sum to one
const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A single fit prediction request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub category: String,
    #[serde(default)]
    pub user: MeasurementRecord,
    #[serde(default)]
    pub product: MeasurementRecord,
}

impl PredictionRequest {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Default::default()
        }
    }

    /// Add a user measurement
    pub fn user(mut self, name: impl Into<String>, value: f64) -> Self {
        self.user.insert(name, Some(value));
        self
    }

    /// Add a product measurement
    pub fn product(mut self, name: impl Into<String>, value: f64) -> Self {
        self.product.insert(name, Some(value));
        self
    }
}

/// Routes prediction requests to per-category classifiers
#[derive(Debug, Clone)]
pub struct PredictionDispatcher {
    registry: Arc<SchemaRegistry>,
    store: Arc<ClassifierStore>,
}

impl PredictionDispatcher {
    /// Create a dispatcher over an already loaded store
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<ClassifierStore>) -> Self {
        Self { registry, store }
    }

    /// Categories that can currently be served, in registry order
    pub fn loaded_categories(&self) -> &[String] {
        self.store.categories()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: ServiceStatus::Healthy,
            loaded_categories: self.store.categories().to_vec(),
        }
    }

    /// Predict fit from separate user and product measurements
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult> {
        let classifier = self.resolve(&request.category)?;
        let record = MeasurementRecord::merge(&request.user, &request.product)?;
        self.run(&request.category, classifier.as_ref(), &record)
    }

    /// Predict fit from an already merged record
    pub fn predict_record(
        &self,
        category: &str,
        record: &MeasurementRecord,
    ) -> Result<PredictionResult> {
        let classifier = self.resolve(category)?;
        self.run(category, classifier.as_ref(), record)
    }

    fn resolve(&self, category: &str) -> Result<Arc<dyn FitClassifier>> {
        self.store.get(category).map_err(|_| Error::InvalidCategory {
            category: category.to_string(),
            available: self.store.categories().to_vec(),
        })
    }

    fn run(
        &self,
        category: &str,
        classifier: &dyn FitClassifier,
        record: &MeasurementRecord,
    ) -> Result<PredictionResult> {
        let features = self.registry.schema(category)?.project(record)?;
        debug!("Dispatching '{}' with features {:?}", category, features);

        let (label, proba) = invoke(classifier, &features).map_err(|e| {
            error!("Classifier for '{}' failed: {}", category, e);
            e
        })?;

        let probabilities = format_probabilities(classifier.classes(), &proba).map_err(|e| {
            error!("Classifier for '{}' returned bad probabilities: {}", category, e);
            e
        })?;

        if !probabilities.contains_key(&label) {
            error!("Classifier for '{}' predicted unknown label '{}'", category, label);
            return Err(Error::prediction_failed(format!(
                "predicted label '{}' is not a known class",
                label
            )));
        }

        Ok(PredictionResult {
            predicted_label: label,
            probabilities,
            category: category.to_string(),
        })
    }
}

/// Call the classifier, converting errors and panics into `PredictionFailed`
fn invoke(classifier: &dyn FitClassifier, features: &[f64]) -> Result<(String, Vec<f64>)> {
    let outcome =
        panic::catch_unwind(AssertUnwindSafe(|| classifier.predict_with_proba(features)));

    match outcome {
        Ok(Ok(prediction)) => Ok(prediction),
        Ok(Err(Error::PredictionFailed(detail))) => Err(Error::PredictionFailed(detail)),
        Ok(Err(other)) => Err(Error::prediction_failed(other.to_string())),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "classifier panicked".to_string());
            Err(Error::prediction_failed(detail))
        }
    }
}

/// Zip class labels with probabilities, normalizing small drift.
fn format_probabilities(classes: &[String], proba: &[f64]) -> Result<BTreeMap<String, f64>> {
    if classes.len() != proba.len() {
        return Err(Error::prediction_failed(format!(
            "{} probabilities for {} classes",
            proba.len(),
            classes.len()
        )));
    }
    if proba.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(Error::prediction_failed("probabilities must be finite and non-negative"));
    }

    let total: f64 = proba.iter().sum();
    if total <= 0.0 {
        return Err(Error::prediction_failed("probabilities sum to zero"));
    }

    let normalize = (total - 1.0).abs() > PROBABILITY_TOLERANCE;
    Ok(classes
        .iter()
        .zip(proba)
        .map(|(label, &p)| (label.clone(), if normalize { p / total } else { p }))
        .collect())
}
