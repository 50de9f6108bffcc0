//! Construction of backend instances for catalog entries.

use crate::classifier::ZeroShotClassifier;
use crate::config::{ModelSpec, RemoteConfig};
use crate::remote::RemoteClassifier;
use modgate_core::{Error, Result};
use secrecy::SecretString;
use std::sync::Arc;

/// Builds a ready-to-use classifier for one catalog entry.
///
/// Construction may be expensive (model download and load, client setup).
/// [`BackendRegistry`](crate::registry::BackendRegistry) guarantees `build`
/// runs at most once per identifier unless it fails.
#[async_trait::async_trait]
pub trait BackendFactory: Send + Sync {
    /// Build the classifier for `model_id`.
    async fn build(&self, model_id: &str, spec: &ModelSpec) -> Result<Arc<dyn ZeroShotClassifier>>;
}

/// Factory for the built-in local and remote backends
pub struct DefaultBackendFactory {
    remote: RemoteConfig,
    api_token: Option<SecretString>,
    http_client: reqwest::Client,
}

impl DefaultBackendFactory {
    /// Create a factory. `api_token` is only required by remote entries.
    pub fn new(remote: RemoteConfig, api_token: Option<SecretString>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(remote.timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            remote,
            api_token,
            http_client,
        })
    }
}

#[async_trait::async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn build(&self, model_id: &str, spec: &ModelSpec) -> Result<Arc<dyn ZeroShotClassifier>> {
        match spec {
            ModelSpec::Remote(remote_spec) => {
                let token = self.api_token.clone().ok_or_else(|| {
                    Error::config(format!(
                        "HF_TOKEN is not set; model '{}' requires an API token",
                        model_id
                    ))
                })?;

                Ok(Arc::new(RemoteClassifier::new(
                    model_id,
                    self.remote.model_url(&remote_spec.repo),
                    self.http_client.clone(),
                    token,
                    self.remote.retry,
                )))
            }
            ModelSpec::Local(local_spec) => build_local(model_id, local_spec).await,
        }
    }
}

#[cfg(feature = "ml-models")]
async fn build_local(
    model_id: &str,
    spec: &crate::config::LocalModelSpec,
) -> Result<Arc<dyn ZeroShotClassifier>> {
    let name = model_id.to_string();
    let spec = spec.clone();

    let classifier = tokio::task::spawn_blocking(move || crate::nli::NliClassifier::load(&name, &spec))
        .await
        .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))??;

    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "ml-models"))]
async fn build_local(
    model_id: &str,
    _spec: &crate::config::LocalModelSpec,
) -> Result<Arc<dyn ZeroShotClassifier>> {
    Err(Error::config(format!(
        "Local model '{}' requires the 'ml-models' feature",
        model_id
    )))
}
