//! Error types for fitcheck

use std::path::PathBuf;

/// Result type alias using fitcheck's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fitcheck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Schema or store lookup miss
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    /// Requested category has no loaded classifier
    #[error("invalid fit category '{category}', available models: {available:?}")]
    InvalidCategory {
        category: String,
        available: Vec<String>,
    },

    /// A feature required by the category schema is absent or null
    #[error("missing required feature '{feature}' for category '{category}'")]
    MissingFeature { feature: String, category: String },

    /// The same field was supplied in both user and product measurements
    #[error("field '{0}' supplied by both user and product measurements")]
    ConflictingField(String),

    /// Known category with no usable training rows
    #[error("no training rows for category '{0}'")]
    EmptyTrainingSet(String),

    /// Artifact could not be deserialized or does not match its schema
    #[error("corrupt artifact {}: {detail}", path.display())]
    CorruptArtifact { path: PathBuf, detail: String },

    /// Fault raised by the classifier during inference
    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    /// Dataset parsing errors
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Model fitting errors
    #[error("training error: {0}")]
    Training(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of errors, used at service boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must change the request
    InvalidInput,
    /// Caller omitted data the category needs
    Unprocessable,
    /// Fault inside the service
    Internal,
}

impl Error {
    /// Create a new missing feature error
    pub fn missing_feature(feature: impl Into<String>, category: impl Into<String>) -> Self {
        Self::MissingFeature {
            feature: feature.into(),
            category: category.into(),
        }
    }

    /// Create a new corrupt artifact error
    pub fn corrupt_artifact(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create a new prediction failure
    pub fn prediction_failed(msg: impl Into<String>) -> Self {
        Self::PredictionFailed(msg.into())
    }

    /// Create a new dataset error
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    /// Create a new training error
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Boundary classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCategory(_) | Self::InvalidCategory { .. } => ErrorKind::InvalidInput,
            Self::MissingFeature { .. } | Self::ConflictingField(_) => ErrorKind::Unprocessable,
            _ => ErrorKind::Internal,
        }
    }

    /// Stable snake_case name of the variant
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnknownCategory(_) => "unknown_category",
            Self::InvalidCategory { .. } => "invalid_category",
            Self::MissingFeature { .. } => "missing_feature",
            Self::ConflictingField(_) => "conflicting_field",
            Self::EmptyTrainingSet(_) => "empty_training_set",
            Self::CorruptArtifact { .. } => "corrupt_artifact",
            Self::PredictionFailed(_) => "prediction_failed",
            Self::Dataset(_) => "dataset",
            Self::Training(_) => "training",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}
