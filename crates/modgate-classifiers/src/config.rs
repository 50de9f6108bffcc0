//! Configuration for the model catalog, remote inference, and request limits

use crate::classifier::BackendKind;
use modgate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for classification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Request defaults and limits
    #[serde(default)]
    pub service: ServiceConfig,

    /// Recognized model identifiers
    #[serde(default)]
    pub models: ModelCatalog,

    /// Hosted inference settings
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl ClassifierConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse classifier config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        let threshold = self.service.default_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!(
                "default_threshold must be between 0 and 1, got {}",
                threshold
            )));
        }
        if self.service.max_texts == 0 {
            return Err(Error::config("max_texts must be at least 1"));
        }
        if self.models.lookup(&self.service.default_model).is_none() {
            return Err(Error::config(format!(
                "default model '{}' is not in the model catalog",
                self.service.default_model
            )));
        }
        Ok(())
    }
}

/// Request defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Threshold applied when a request does not carry one
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Texts beyond this count are dropped from a request
    #[serde(default = "default_max_texts")]
    pub max_texts: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            default_model: default_model(),
            max_texts: default_max_texts(),
        }
    }
}

/// Closed set of model identifiers the service accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelSpec>,
}

impl ModelCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Add or replace an entry
    pub fn with_model(mut self, id: impl Into<String>, spec: ModelSpec) -> Self {
        self.models.insert(id.into(), spec);
        self
    }

    /// Find a model by identifier or by its repository name.
    ///
    /// Returns the canonical identifier alongside the spec, so callers that
    /// key caches on the result share one entry for both spellings.
    pub fn lookup(&self, id: &str) -> Option<(&str, &ModelSpec)> {
        if let Some((key, spec)) = self.models.get_key_value(id) {
            return Some((key.as_str(), spec));
        }
        self.models
            .iter()
            .find(|(_, spec)| spec.repo() == id)
            .map(|(key, spec)| (key.as_str(), spec))
    }

    /// Iterate entries in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelSpec)> {
        self.models.iter().map(|(key, spec)| (key.as_str(), spec))
    }

    /// Whether any entry needs the hosted inference API
    pub fn has_remote(&self) -> bool {
        self.models
            .values()
            .any(|spec| spec.kind() == BackendKind::Remote)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
            .with_model(
                "distilbert-mnli",
                ModelSpec::Local(LocalModelSpec::new("typeform/distilbert-base-uncased-mnli")),
            )
            .with_model(
                "bart-large-mnli",
                ModelSpec::Remote(RemoteModelSpec::new("facebook/bart-large-mnli")),
            )
            .with_model(
                "distilbart-mnli-12-1",
                ModelSpec::Remote(RemoteModelSpec::new("valhalla/distilbart-mnli-12-1")),
            )
            .with_model(
                "xlm-roberta-xnli",
                ModelSpec::Remote(RemoteModelSpec::new("joeddav/xlm-roberta-large-xnli")),
            )
    }
}

/// How to reach one catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ModelSpec {
    /// In-process NLI model downloaded from the Hugging Face Hub
    Local(LocalModelSpec),
    /// Model served by the hosted inference API
    Remote(RemoteModelSpec),
}

impl ModelSpec {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local(_) => BackendKind::Local,
            Self::Remote(_) => BackendKind::Remote,
        }
    }

    /// Hugging Face repository backing this entry
    pub fn repo(&self) -> &str {
        match self {
            Self::Local(spec) => &spec.repo,
            Self::Remote(spec) => &spec.repo,
        }
    }
}

/// Local NLI model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelSpec {
    /// Hugging Face repository id
    pub repo: String,

    /// Repository revision
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Inference device: cpu, cuda, or metal
    #[serde(default = "default_device")]
    pub device: String,

    /// Maximum tokens per premise/hypothesis pair
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Hypothesis built for each label; `{}` is replaced by the label
    #[serde(default = "default_hypothesis_template")]
    pub hypothesis_template: String,
}

impl LocalModelSpec {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            revision: default_revision(),
            device: default_device(),
            max_length: default_max_length(),
            hypothesis_template: default_hypothesis_template(),
        }
    }
}

/// Hosted model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteModelSpec {
    /// Model name appended to the inference endpoint
    pub repo: String,
}

impl RemoteModelSpec {
    pub fn new(repo: impl Into<String>) -> Self {
        Self { repo: repo.into() }
    }
}

/// Hosted inference API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL; the model repo is appended as a path segment
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-attempt request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transient-failure retry policy
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full URL for a model
    pub fn model_url(&self, repo: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), repo)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Linear, capped backoff for transient backend failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Length of one backoff unit in milliseconds
    #[serde(default = "default_delay_unit_ms")]
    pub delay_unit_ms: u64,

    /// Backoff never exceeds this many units
    #[serde(default = "default_max_delay_units")]
    pub max_delay_units: u32,
}

impl RetryPolicy {
    /// Attempts to make; always at least one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the failed attempt `attempt_index` (0-based):
    /// `min(1 + attempt_index, max_delay_units)` units.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let units = attempt_index.saturating_add(1).min(self.max_delay_units);
        Duration::from_millis(self.delay_unit_ms.saturating_mul(u64::from(units)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_unit_ms: default_delay_unit_ms(),
            max_delay_units: default_max_delay_units(),
        }
    }
}

fn default_threshold() -> f32 {
    0.7
}

fn default_model() -> String {
    "distilbert-mnli".to_string()
}

fn default_max_texts() -> usize {
    128
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_max_length() -> usize {
    512
}

fn default_hypothesis_template() -> String {
    "This example is {}.".to_string()
}

fn default_endpoint() -> String {
    "https://router.huggingface.co/hf-inference/models".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_unit_ms() -> u64 {
    1000
}

fn default_max_delay_units() -> u32 {
    3
}
