//! Shared application state

use crate::config::ServerConfig;
use fitcheck_classifiers::{ClassifierStore, PredictionDispatcher, SchemaRegistry};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

/// Application state shared across request handlers
///
/// Everything in here is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub dispatcher: Arc<PredictionDispatcher>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Load every artifact under `config.models_dir` and build the dispatcher
    pub fn load(config: ServerConfig, metrics: PrometheusHandle) -> anyhow::Result<Self> {
        let registry = SchemaRegistry::standard();

        info!("Loading models from {}", config.models_dir.display());
        let store = ClassifierStore::load_all(&registry, &config.models_dir)?;
        info!("Loaded models: {:?}", store.categories());

        let dispatcher = PredictionDispatcher::new(Arc::new(registry), Arc::new(store));
        Ok(Self::new(config, dispatcher, metrics))
    }

    /// Wrap an already constructed dispatcher
    pub fn new(config: ServerConfig, dispatcher: PredictionDispatcher, metrics: PrometheusHandle) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            metrics,
        }
    }
}
