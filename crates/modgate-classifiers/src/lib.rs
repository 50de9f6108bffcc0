//! modgate classifiers
//!
//! Zero-shot text classification backends and the machinery around them:
//!
//! - [`ZeroShotClassifier`]: the backend contract (local NLI model or hosted API)
//! - [`BackendRegistry`]: lazily builds one shared backend per catalog model
//! - [`select_labels`]: threshold selection with a top-1 fallback
//! - [`ClassificationService`]: per-request orchestration
//!
//! The in-process NLI backend is compiled with the `ml-models` feature.

pub mod classifier;
pub mod config;
pub mod factory;
#[cfg(feature = "ml-models")]
pub mod nli;
pub mod registry;
pub mod remote;
pub mod selector;
pub mod service;

pub use classifier::{BackendKind, ZeroShotClassifier};
pub use config::{
    ClassifierConfig, LocalModelSpec, ModelCatalog, ModelSpec, RemoteConfig, RemoteModelSpec,
    RetryPolicy, ServiceConfig,
};
pub use factory::{BackendFactory, DefaultBackendFactory};
#[cfg(feature = "ml-models")]
pub use nli::NliClassifier;
pub use registry::{BackendRegistry, ModelInfo};
pub use remote::RemoteClassifier;
pub use selector::select_labels;
pub use service::{normalize, ClassificationService, NormalizedRequest};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{BackendKind, ZeroShotClassifier};
    pub use crate::config::{ClassifierConfig, ModelCatalog, ModelSpec};
    pub use crate::factory::{BackendFactory, DefaultBackendFactory};
    pub use crate::registry::BackendRegistry;
    pub use crate::service::ClassificationService;
}
