//! fitcheck Classifiers
//!
//! Category-dispatched fit prediction.
//!
//! Every fit category owns a fixed, ordered feature schema and a classifier
//! trained on exactly those columns:
//! - [`SchemaRegistry`] maps a category to its ordered features
//! - [`TrainingPipeline`] partitions a unified dataset and fits one forest per category
//! - [`ClassifierStore`] loads the per-category artifacts once at startup
//! - [`PredictionDispatcher`] validates, orders and routes each request
//!
//! The store is immutable after construction and is shared behind `Arc`, so
//! concurrent requests need no locking.

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod dispatcher;
pub mod forest;
pub mod schema;
pub mod store;
pub mod training;

pub use classifier::FitClassifier;
pub use config::TrainingConfig;
pub use dataset::{Dataset, DatasetLayout, DatasetRow};
pub use dispatcher::{PredictionDispatcher, PredictionRequest};
pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use schema::{FeatureSchema, SchemaRegistry};
pub use store::{ArtifactDir, ClassifierArtifact, ClassifierStore};
pub use training::{CategoryReport, TrainingPipeline, TrainingReport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::FitClassifier;
    pub use crate::dispatcher::{PredictionDispatcher, PredictionRequest};
    pub use crate::forest::{ForestParams, RandomForest};
    pub use crate::schema::SchemaRegistry;
    pub use crate::store::ClassifierStore;
    pub use fitcheck_core::{MeasurementRecord, PredictionResult};
}
