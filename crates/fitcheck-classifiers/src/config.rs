//! Configuration for offline training runs

use crate::dataset::{DatasetLayout, CATEGORY_COLUMN, TARGET_COLUMN};
use crate::forest::ForestParams;
use crate::schema::SchemaRegistry;
use fitcheck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Training run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Unified CSV dataset
    pub dataset_path: PathBuf,

    /// Directory receiving one artifact per category
    pub models_dir: PathBuf,

    /// Column holding the fit category
    pub category_column: String,

    /// Column holding the fit rating
    pub target_column: String,

    /// Only train these categories (all dataset categories when unset)
    pub categories: Option<Vec<String>>,

    /// Fail the run on categories missing from the registry
    pub strict: bool,

    /// Forest hyperparameters
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("fit_dataset.csv"),
            models_dir: default_models_dir(),
            category_column: CATEGORY_COLUMN.to_string(),
            target_column: TARGET_COLUMN.to_string(),
            categories: None,
            strict: false,
            forest: ForestParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("invalid training config: {}", e)))
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// CSV layout for this configuration and registry
    pub fn layout(&self, registry: &SchemaRegistry) -> DatasetLayout {
        DatasetLayout::for_registry(registry)
            .with_columns(self.category_column.as_str(), self.target_column.as_str())
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}
