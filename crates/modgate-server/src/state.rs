//! Application state shared across requests

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use modgate_classifiers::{BackendFactory, BackendRegistry, ClassificationService, DefaultBackendFactory};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Request orchestration over the shared backend registry
    pub service: Arc<ClassificationService>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Build state with the built-in local and remote backends
    pub async fn new(config: ServerConfig, metrics_handle: PrometheusHandle) -> Result<Self> {
        let factory = DefaultBackendFactory::new(
            config.classifiers.remote.clone(),
            config.hf_token.clone(),
        )?;
        Self::with_factory(config, Arc::new(factory), metrics_handle).await
    }

    /// Build state around a caller-supplied backend factory
    pub async fn with_factory(
        config: ServerConfig,
        factory: Arc<dyn BackendFactory>,
        metrics_handle: PrometheusHandle,
    ) -> Result<Self> {
        if config.missing_token() {
            warn!("HF_TOKEN is not set; remote models will fail until it is configured");
        }

        let registry = Arc::new(BackendRegistry::new(
            config.classifiers.models.clone(),
            factory,
        ));

        if !config.preload.is_empty() {
            info!("Preloading models: {}", config.preload.join(", "));
            registry.preload(&config.preload).await?;
        }

        let service = Arc::new(ClassificationService::new(
            registry,
            config.classifiers.service.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            service,
            metrics_handle,
        })
    }
}
