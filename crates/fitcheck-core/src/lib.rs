//! fitcheck Core
//!
//! Core types and utilities shared across fitcheck components.
//!
//! This crate provides:
//! - The error taxonomy used by training, artifact loading and prediction
//! - Measurement records and their merge policy
//! - Prediction and health result types

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{FitLabel, HealthStatus, MeasurementRecord, PredictionResult, ServiceStatus};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::types::{HealthStatus, MeasurementRecord, PredictionResult};
}
