//! Offline training pipeline
//!
//! Partitions a unified dataset by fit category and fits one forest per
//! category on exactly the columns of that category's schema. Training is a
//! best-effort batch job: a category that cannot be trained is reported and
//! the run moves on to the next one.

use crate::classifier::FitClassifier;
use crate::dataset::Dataset;
use crate::forest::{ForestParams, RandomForest};
use crate::schema::SchemaRegistry;
use crate::store::{ArtifactDir, ClassifierArtifact};
use fitcheck_core::{Error, Result};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Summary of one successfully trained category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub category: String,
    pub samples: usize,
    /// Rows dropped because a required feature was empty
    pub dropped: usize,
    pub classes: Vec<String>,
    pub training_accuracy: f64,
    pub artifact_path: PathBuf,
}

/// Outcome of a whole training run
#[derive(Debug, Default)]
pub struct TrainingReport {
    pub trained: Vec<CategoryReport>,
    /// Categories present in the data but absent from the registry
    pub skipped: Vec<String>,
    /// Registered categories whose training failed
    pub failed: Vec<(String, Error)>,
}

impl TrainingReport {
    /// True when every attempted category produced an artifact
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Trains and persists one classifier per category
pub struct TrainingPipeline<'a> {
    registry: &'a SchemaRegistry,
    artifacts: ArtifactDir,
    params: ForestParams,
    strict: bool,
    only: Option<Vec<String>>,
}

impl<'a> TrainingPipeline<'a> {
    /// Create a pipeline writing artifacts into `artifacts`
    pub fn new(registry: &'a SchemaRegistry, artifacts: ArtifactDir, params: ForestParams) -> Self {
        Self {
            registry,
            artifacts,
            params,
            strict: false,
            only: None,
        }
    }

    /// Fail the whole run when the dataset contains an unregistered category
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Restrict training to the listed categories
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.only = Some(categories);
        self
    }

    /// Train every category in the dataset (or the configured subset)
    pub fn run(&self, dataset: &Dataset) -> Result<TrainingReport> {
        let categories: Vec<String> = match &self.only {
            Some(only) => only.clone(),
            None => dataset.categories().into_iter().map(String::from).collect(),
        };
        info!("Found fit categories: {:?}", categories);

        if self.strict {
            if let Some(unknown) = categories.iter().find(|c| !self.registry.contains(c)) {
                return Err(Error::UnknownCategory(unknown.clone()));
            }
        }

        let mut report = TrainingReport::default();
        for category in categories {
            if !self.registry.contains(&category) {
                warn!(
                    "No feature definition for category '{}', skipping",
                    category
                );
                report.skipped.push(category);
                continue;
            }

            info!("Training model for category '{}'", category);
            match self.train_category(dataset, &category) {
                Ok(trained) => {
                    info!(
                        "Saved '{}' model to {} ({} samples, training accuracy {:.3})",
                        category,
                        trained.artifact_path.display(),
                        trained.samples,
                        trained.training_accuracy
                    );
                    report.trained.push(trained);
                }
                Err(e) => {
                    error!("Training failed for category '{}': {}", category, e);
                    report.failed.push((category, e));
                }
            }
        }

        Ok(report)
    }

    /// Fit and persist a single registered category
    pub fn train_category(&self, dataset: &Dataset, category: &str) -> Result<CategoryReport> {
        let schema = self.registry.schema(category)?;

        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut dropped = 0usize;
        for row in dataset.rows_for(category) {
            match schema.project(&row.values) {
                Ok(features) => {
                    x.push(features);
                    y.push(row.label.clone());
                }
                Err(_) => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(
                "Dropped {} '{}' rows with empty required features",
                dropped, category
            );
        }
        if x.is_empty() {
            return Err(Error::EmptyTrainingSet(category.to_string()));
        }

        info!("Training with {} samples", x.len());
        let model = RandomForest::fit(&self.params, &x, &y)?;
        let training_accuracy = model.accuracy(&x, &y)?;
        let classes = model.classes().to_vec();

        let artifact = ClassifierArtifact::new(schema, model, x.len());
        let artifact_path = self.artifacts.save(&artifact)?;

        Ok(CategoryReport {
            category: category.to_string(),
            samples: x.len(),
            dropped,
            classes,
            training_accuracy,
            artifact_path,
        })
    }
}
