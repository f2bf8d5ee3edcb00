//! Category feature schemas
//!
//! The registry is the single source of truth for which measurements a fit
//! category needs and in what order. Training projects dataset rows through it
//! before fitting and the dispatcher projects requests through it before
//! predicting, so both sides always agree on column order.

use fitcheck_core::{Error, MeasurementRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Feature column names used by the standard registry
pub mod features {
    pub const USER_BUST_CM: &str = "user_bust_cm";
    pub const USER_WAIST_CM: &str = "user_waist_cm";
    pub const USER_HIP_CM: &str = "user_hip_cm";
    pub const PRODUCT_CHEST_CM: &str = "product_chest_cm";
    pub const PRODUCT_WAIST_CM: &str = "product_waist_cm";
    pub const PRODUCT_HIP_CM: &str = "product_hip_cm";
}

/// Category names used by the standard registry
pub mod categories {
    pub const UPPER_FITTED: &str = "upper_fitted";
    pub const UPPER_LOOSE: &str = "upper_loose";
    pub const LOWER_FITTED: &str = "lower_fitted";
    pub const LOWER_LOOSE: &str = "lower_loose";
    pub const DRESSES: &str = "dresses";
}

/// Ordered feature list for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    category: String,
    features: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema; feature order is significant
    pub fn new<I, S>(category: impl Into<String>, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category: category.into(),
            features: features.into_iter().map(Into::into).collect(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Project a record onto this schema's feature order.
    ///
    /// Fails on the first feature that is absent or null; never substitutes a
    /// default.
    pub fn project(&self, record: &MeasurementRecord) -> Result<Vec<f64>> {
        self.features
            .iter()
            .map(|name| {
                record
                    .get(name)
                    .ok_or_else(|| Error::missing_feature(name.as_str(), self.category.as_str()))
            })
            .collect()
    }
}

/// Registry mapping fit categories to feature schemas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    schemas: Vec<FeatureSchema>,
}

impl SchemaRegistry {
    /// Build a registry, rejecting duplicate categories, empty schemas and
    /// repeated features within a schema.
    pub fn new(schemas: Vec<FeatureSchema>) -> Result<Self> {
        let mut seen = HashSet::new();
        for schema in &schemas {
            if !seen.insert(schema.category.as_str()) {
                return Err(Error::config(format!(
                    "category '{}' defined more than once",
                    schema.category
                )));
            }
            if schema.is_empty() {
                return Err(Error::config(format!(
                    "category '{}' has no features",
                    schema.category
                )));
            }
            let distinct: HashSet<&str> = schema.features.iter().map(String::as_str).collect();
            if distinct.len() != schema.len() {
                return Err(Error::config(format!(
                    "category '{}' lists a feature twice",
                    schema.category
                )));
            }
        }
        Ok(Self { schemas })
    }

    /// The five garment categories served in production
    pub fn standard() -> Self {
        use self::categories::*;
        use self::features::*;

        Self {
            schemas: vec![
                FeatureSchema::new(
                    UPPER_FITTED,
                    [USER_BUST_CM, USER_WAIST_CM, PRODUCT_CHEST_CM, PRODUCT_WAIST_CM],
                ),
                FeatureSchema::new(UPPER_LOOSE, [USER_BUST_CM, PRODUCT_CHEST_CM]),
                FeatureSchema::new(
                    LOWER_FITTED,
                    [USER_WAIST_CM, USER_HIP_CM, PRODUCT_WAIST_CM, PRODUCT_HIP_CM],
                ),
                FeatureSchema::new(
                    LOWER_LOOSE,
                    [USER_WAIST_CM, USER_HIP_CM, PRODUCT_WAIST_CM, PRODUCT_HIP_CM],
                ),
                FeatureSchema::new(
                    DRESSES,
                    [
                        USER_BUST_CM,
                        USER_WAIST_CM,
                        USER_HIP_CM,
                        PRODUCT_CHEST_CM,
                        PRODUCT_WAIST_CM,
                        PRODUCT_HIP_CM,
                    ],
                ),
            ],
        }
    }

    /// Schema for a category
    pub fn schema(&self, category: &str) -> Result<&FeatureSchema> {
        self.schemas
            .iter()
            .find(|s| s.category == category)
            .ok_or_else(|| Error::UnknownCategory(category.to_string()))
    }

    /// Ordered feature names for a category
    pub fn features_for(&self, category: &str) -> Result<&[String]> {
        self.schema(category).map(FeatureSchema::features)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.schemas.iter().any(|s| s.category == category)
    }

    /// Categories in declaration order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.category.as_str())
    }

    /// Position of a category in declaration order
    pub fn position(&self, category: &str) -> Option<usize> {
        self.schemas.iter().position(|s| s.category == category)
    }

    /// Union of all schema features, in first-appearance order
    pub fn all_features(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.schemas
            .iter()
            .flat_map(|s| s.features.iter())
            .filter(|f| seen.insert(f.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
