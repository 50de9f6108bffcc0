//! Core types for modgate

use serde::{Deserialize, Serialize};

/// Candidate labels used when a request does not supply its own.
pub const DEFAULT_LABELS: [&str; 10] = [
    "toxic",
    "insult",
    "harassment",
    "hate_speech",
    "racism",
    "sexism",
    "sexual_content",
    "self_harm",
    "spam",
    "safe",
];

/// Incoming classification request, as received over the wire.
///
/// Nothing here is normalized yet: texts and labels may contain blank
/// entries, and `threshold`/`model` fall back to service configuration
/// when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Texts to classify, in order
    pub texts: Vec<String>,

    /// Candidate labels
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Score labels independently instead of as one distribution
    #[serde(default = "default_multi_label")]
    pub multi_label: bool,

    /// Minimum score for a label to be picked
    #[serde(default)]
    pub threshold: Option<f32>,

    /// Model identifier from the configured catalog
    #[serde(default)]
    pub model: Option<String>,
}

impl ClassifyRequest {
    /// Create a request for the given texts with default labels
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
            labels: default_labels(),
            multi_label: default_multi_label(),
            threshold: None,
            model: None,
        }
    }

    /// Replace the candidate labels
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the selection threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Select a model from the catalog
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Toggle multi-label scoring
    pub fn with_multi_label(mut self, multi_label: bool) -> Self {
        self.multi_label = multi_label;
        self
    }
}

fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
}

fn default_multi_label() -> bool {
    true
}

/// A candidate label with the confidence the backend assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePair {
    /// Candidate label
    pub label: String,

    /// Confidence score (0.0-1.0)
    pub score: f32,
}

impl ScorePair {
    /// Create a new score pair
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Classification outcome for one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyItem {
    /// The trimmed input text
    pub text: String,

    /// Labels that met the selection policy, highest score first
    pub picked: Vec<ScorePair>,

    /// Every label the backend scored, in backend order
    pub all: Vec<ScorePair>,
}

/// Response body for `POST /classify`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    /// One item per processed text, in input order
    pub results: Vec<ClassifyItem>,
}
