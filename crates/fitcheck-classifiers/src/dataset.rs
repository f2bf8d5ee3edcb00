//! Unified training dataset
//!
//! One CSV holds rows for every category. Each row carries its category, its
//! fit rating and whichever measurement columns its category needs; cells a
//! category does not use may be left empty.

use crate::schema::SchemaRegistry;
use fitcheck_core::{Error, MeasurementRecord, Result};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Default name of the category column
pub const CATEGORY_COLUMN: &str = "fit_category";

/// Default name of the target label column
pub const TARGET_COLUMN: &str = "fit_rating";

/// Which CSV columns to read and how to interpret them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub category_column: String,
    pub target_column: String,
    pub feature_columns: Vec<String>,
}

impl DatasetLayout {
    /// Default column names with every feature the registry references
    pub fn for_registry(registry: &SchemaRegistry) -> Self {
        Self {
            category_column: CATEGORY_COLUMN.to_string(),
            target_column: TARGET_COLUMN.to_string(),
            feature_columns: registry.all_features().into_iter().map(String::from).collect(),
        }
    }

    /// Override the category and target column names
    pub fn with_columns(mut self, category: impl Into<String>, target: impl Into<String>) -> Self {
        self.category_column = category.into();
        self.target_column = target.into();
        self
    }
}

/// One labelled example
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub category: String,
    pub label: String,
    pub values: MeasurementRecord,
}

/// Ordered collection of labelled rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn from_rows(rows: Vec<DatasetRow>) -> Self {
        Self { rows }
    }

    /// Load a dataset from a CSV file
    pub fn from_path(path: impl AsRef<Path>, layout: &DatasetLayout) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::dataset(format!("cannot open {}: {}", path.display(), e)))?;
        let dataset = Self::from_reader(file, layout)?;
        debug!("Read {} rows from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    /// Parse CSV with a header row
    pub fn from_reader<R: Read>(reader: R, layout: &DatasetLayout) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| Error::dataset(format!("cannot read header: {}", e)))?
            .clone();

        let column = |name: &str| headers.iter().position(|h| h == name);
        let category_idx = column(&layout.category_column).ok_or_else(|| {
            Error::dataset(format!("missing column '{}'", layout.category_column))
        })?;
        let target_idx = column(&layout.target_column)
            .ok_or_else(|| Error::dataset(format!("missing column '{}'", layout.target_column)))?;

        let mut feature_idx = Vec::with_capacity(layout.feature_columns.len());
        for name in &layout.feature_columns {
            match column(name) {
                Some(idx) => feature_idx.push((name.as_str(), idx)),
                None => warn!("Dataset has no '{}' column", name),
            }
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| Error::dataset(e.to_string()))?;
            let line = record.position().map_or(0, |p| p.line());

            let category = record.get(category_idx).unwrap_or_default();
            let label = record.get(target_idx).unwrap_or_default();
            if category.is_empty() || label.is_empty() {
                return Err(Error::dataset(format!(
                    "line {}: empty '{}' or '{}'",
                    line, layout.category_column, layout.target_column
                )));
            }

            let mut values = MeasurementRecord::new();
            for &(name, idx) in &feature_idx {
                let cell = record.get(idx).unwrap_or_default();
                let value = if cell.is_empty() {
                    None
                } else {
                    let parsed = cell.parse::<f64>().map_err(|_| {
                        Error::dataset(format!("line {}: '{}' is not numeric: {:?}", line, name, cell))
                    })?;
                    Some(parsed)
                };
                values.insert(name, value);
            }

            rows.push(DatasetRow {
                category: category.to_string(),
                label: label.to_string(),
                values,
            });
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct categories in first-appearance order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|r| r.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Rows belonging to one category
    pub fn rows_for<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a DatasetRow> + 'a {
        self.rows.iter().filter(move |r| r.category == category)
    }
}
