//! Backend registry: resolves model identifiers to shared classifier instances

use crate::classifier::{BackendKind, ZeroShotClassifier};
use crate::config::ModelCatalog;
use crate::factory::BackendFactory;
use modgate_core::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

type BackendSlot = Arc<OnceCell<Arc<dyn ZeroShotClassifier>>>;

/// Registry of lazily constructed backends, one per catalog identifier.
///
/// Instances are built on first use and kept for the life of the process.
/// Concurrent first use of the same identifier waits on a single
/// construction. A failed construction leaves the slot empty so the next
/// call tries again.
pub struct BackendRegistry {
    catalog: ModelCatalog,
    factory: Arc<dyn BackendFactory>,
    slots: Mutex<HashMap<String, BackendSlot>>,
}

impl BackendRegistry {
    /// Create a registry over a fixed catalog
    pub fn new(catalog: ModelCatalog, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            catalog,
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the classifier for `model_id` (constructs it on first access)
    pub async fn resolve(&self, model_id: &str) -> Result<Arc<dyn ZeroShotClassifier>> {
        let (key, spec) = self
            .catalog
            .lookup(model_id)
            .ok_or_else(|| Error::unknown_model(model_id))?;

        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let classifier = slot
            .get_or_try_init(|| async {
                info!("Loading {} backend '{}' ({})", spec.kind(), key, spec.repo());
                self.factory.build(key, spec).await
            })
            .await?;

        Ok(Arc::clone(classifier))
    }

    /// Construct the named backends ahead of the first request
    pub async fn preload(&self, model_ids: &[String]) -> Result<()> {
        for model_id in model_ids {
            self.resolve(model_id).await?;
        }
        Ok(())
    }

    /// Whether the backend for `model_id` has been constructed
    pub async fn is_loaded(&self, model_id: &str) -> bool {
        let Some((key, _)) = self.catalog.lookup(model_id) else {
            return false;
        };
        let slots = self.slots.lock().await;
        slots.get(key).is_some_and(|slot| slot.initialized())
    }

    /// Describe every catalog entry
    pub async fn models(&self) -> Vec<ModelInfo> {
        let slots = self.slots.lock().await;
        self.catalog
            .iter()
            .map(|(id, spec)| ModelInfo {
                id: id.to_string(),
                backend: spec.kind(),
                repo: spec.repo().to_string(),
                loaded: slots.get(id).is_some_and(|slot| slot.initialized()),
            })
            .collect()
    }

    /// Access the catalog
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }
}

/// Catalog entry as reported by `GET /models`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub backend: BackendKind,
    pub repo: String,
    pub loaded: bool,
}
