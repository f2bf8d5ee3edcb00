//! fitcheck Server
//!
//! HTTP front end for category-dispatched fit prediction. Classifier
//! artifacts are loaded once at startup; handlers share the resulting
//! dispatcher read-only.

pub mod config;
pub mod routes;
pub mod state;

pub use config::{ConfigOverrides, ServerConfig};
pub use routes::{create_router, AppError, HealthResponse, PredictRequest, PredictResponse};
pub use state::AppState;
