//! Zero-shot classifier trait and common types

use async_trait::async_trait;
use modgate_core::{Result, ScorePair};
use serde::{Deserialize, Serialize};

/// Trait for all zero-shot backends
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    /// Score `text` against every candidate label.
    ///
    /// The returned pairs are ordered by descending score. Callers rely on
    /// that order and never re-sort.
    async fn classify(
        &self,
        text: &str,
        labels: &[String],
        multi_label: bool,
    ) -> Result<Vec<ScorePair>>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Where inference runs
    fn kind(&self) -> BackendKind;
}

/// Where a backend performs inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process model
    Local,
    /// Hosted inference API reached over HTTP
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
