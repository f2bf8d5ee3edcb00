//! Core types for fitcheck

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Five-point ordinal fit rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FitLabel {
    #[serde(rename = "Very Tight")]
    VeryTight,
    #[serde(rename = "Slightly Tight")]
    SlightlyTight,
    #[serde(rename = "Perfect Fit")]
    PerfectFit,
    #[serde(rename = "Slightly Loose")]
    SlightlyLoose,
    #[serde(rename = "Very Loose")]
    VeryLoose,
}

impl FitLabel {
    /// All labels, tightest first
    pub const ALL: [FitLabel; 5] = [
        FitLabel::VeryTight,
        FitLabel::SlightlyTight,
        FitLabel::PerfectFit,
        FitLabel::SlightlyLoose,
        FitLabel::VeryLoose,
    ];

    /// Display name as it appears in datasets and responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryTight => "Very Tight",
            Self::SlightlyTight => "Slightly Tight",
            Self::PerfectFit => "Perfect Fit",
            Self::SlightlyLoose => "Slightly Loose",
            Self::VeryLoose => "Very Loose",
        }
    }

    /// Rate a garment from `user - product` in centimetres.
    ///
    /// Positive differences mean the body is larger than the garment.
    pub fn from_difference(diff: f64) -> Self {
        if diff > 4.0 {
            Self::VeryTight
        } else if diff > 1.5 {
            Self::SlightlyTight
        } else if diff < -5.0 {
            Self::VeryLoose
        } else if diff < -2.0 {
            Self::SlightlyLoose
        } else {
            Self::PerfectFit
        }
    }
}

impl fmt::Display for FitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named numeric measurements, any of which may be null
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementRecord(BTreeMap<String, Option<f64>>);

impl MeasurementRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a present value
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), Some(value));
        self
    }

    /// Insert a value, returning the previous one
    pub fn insert(&mut self, name: impl Into<String>, value: Option<f64>) -> Option<Option<f64>> {
        self.0.insert(name.into(), value)
    }

    /// Value of a field; `None` when absent or null
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().flatten()
    }

    /// Whether the field key is present at all (even if null)
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over field names and values in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Merge two records into one flat record.
    ///
    /// Key sets are expected to be disjoint. Any overlapping key, null or not,
    /// is rejected with [`Error::ConflictingField`].
    pub fn merge(first: &MeasurementRecord, second: &MeasurementRecord) -> Result<Self> {
        let mut merged = first.0.clone();
        for (name, value) in &second.0 {
            if merged.contains_key(name) {
                return Err(Error::ConflictingField(name.clone()));
            }
            merged.insert(name.clone(), *value);
        }
        Ok(Self(merged))
    }
}

impl FromIterator<(String, Option<f64>)> for MeasurementRecord {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Label chosen by the classifier
    pub predicted_label: String,

    /// Probability per class label
    pub probabilities: BTreeMap<String, f64>,

    /// Category whose classifier answered
    pub category: String,
}

impl PredictionResult {
    /// Probability assigned to the predicted label
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(&self.predicted_label)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Service liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Healthy,
}

/// Health report listing categories that can currently be served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    pub loaded_categories: Vec<String>,
}
