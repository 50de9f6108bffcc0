//! Request orchestration: normalize, classify each text, select labels

use crate::config::ServiceConfig;
use crate::registry::BackendRegistry;
use crate::selector::select_labels;
use modgate_core::{ClassifyItem, ClassifyRequest, ClassifyResponse, Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Classification request after trimming, defaulting, and capping
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub texts: Vec<String>,
    pub labels: Vec<String>,
    pub multi_label: bool,
    pub threshold: f32,
    pub model: String,
}

/// Stateless entry point for `POST /classify`
pub struct ClassificationService {
    registry: Arc<BackendRegistry>,
    config: ServiceConfig,
}

impl ClassificationService {
    pub fn new(registry: Arc<BackendRegistry>, config: ServiceConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Classify every text of `request`, in order.
    ///
    /// The first backend failure aborts the whole request; no partial
    /// response is produced.
    #[instrument(name = "classify", skip_all, fields(texts = request.texts.len()))]
    pub async fn classify(&self, request: ClassifyRequest) -> Result<ClassifyResponse> {
        let start = Instant::now();
        let request = normalize(request, &self.config)?;

        let classifier = self.registry.resolve(&request.model).await?;

        let mut results = Vec::with_capacity(request.texts.len());
        for text in request.texts {
            let all = classifier
                .classify(&text, &request.labels, request.multi_label)
                .await?;
            let picked = select_labels(&all, request.threshold);
            debug!(
                model = %request.model,
                picked = picked.len(),
                scored = all.len(),
                "Classified text"
            );
            results.push(ClassifyItem { text, picked, all });
        }

        let elapsed = start.elapsed();
        metrics::counter!("modgate_texts_classified_total").increment(results.len() as u64);
        metrics::histogram!("modgate_request_latency_us").record(elapsed.as_micros() as f64);
        info!(
            model = %request.model,
            texts = results.len(),
            labels = request.labels.len(),
            latency_ms = elapsed.as_millis() as u64,
            "Classification request complete"
        );

        Ok(ClassifyResponse { results })
    }
}

/// Trim and drop blank texts and labels, apply configured defaults, and cap
/// the number of texts at `config.max_texts`.
pub fn normalize(request: ClassifyRequest, config: &ServiceConfig) -> Result<NormalizedRequest> {
    let texts: Vec<String> = non_blank(request.texts)
        .take(config.max_texts)
        .collect();
    if texts.is_empty() {
        return Err(Error::validation("No texts provided."));
    }

    let labels: Vec<String> = non_blank(request.labels).collect();
    if labels.is_empty() {
        return Err(Error::validation("No labels provided."));
    }

    let threshold = request.threshold.unwrap_or(config.default_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::validation(format!(
            "threshold must be between 0 and 1, got {}",
            threshold
        )));
    }

    let model = request
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| config.default_model.clone());

    Ok(NormalizedRequest {
        texts,
        labels,
        multi_label: request.multi_label,
        threshold,
        model,
    })
}

fn non_blank(values: Vec<String>) -> impl Iterator<Item = String> {
    values.into_iter().filter_map(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
