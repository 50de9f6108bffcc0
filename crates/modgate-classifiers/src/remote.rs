//! Zero-shot classification through a hosted inference API
//!
//! Speaks the Hugging Face Inference API request/response shape. Overload
//! (503/504) and cold-start "model is loading" replies are retried with a
//! linear, capped backoff; every other failure is returned immediately.

use crate::classifier::{BackendKind, ZeroShotClassifier};
use crate::config::RetryPolicy;
use async_trait::async_trait;
use modgate_core::{Error, Result, ScorePair};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Classifier backed by a remote zero-shot endpoint
pub struct RemoteClassifier {
    name: String,
    url: String,
    client: reqwest::Client,
    token: SecretString,
    retry: RetryPolicy,
}

impl RemoteClassifier {
    /// Create a classifier posting to `url`.
    ///
    /// `client` should carry the per-attempt timeout.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
        token: SecretString,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
            token,
            retry,
        }
    }

    /// Endpoint this classifier posts to
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, payload: &InferenceRequest<'_>) -> Result<(u16, String)> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::backend(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::backend(format!("Failed to read response body: {}", e)))?;

        Ok((status, body))
    }
}

#[async_trait]
impl ZeroShotClassifier for RemoteClassifier {
    async fn classify(
        &self,
        text: &str,
        labels: &[String],
        multi_label: bool,
    ) -> Result<Vec<ScorePair>> {
        let payload = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                candidate_labels: labels,
                multi_label,
            },
        };

        let attempts = self.retry.attempts();
        let mut last_failure = String::new();

        for attempt in 0..attempts {
            let (status, body) = self.send(&payload).await?;

            match interpret_response(status, &body) {
                Outcome::Scores(pairs) => {
                    debug!(model = %self.name, attempt, "Remote classification succeeded");
                    return Ok(pairs);
                }
                Outcome::Failed(err) => return Err(err),
                Outcome::Transient(diagnostic) => {
                    last_failure = diagnostic;
                    if attempt + 1 < attempts {
                        let delay = self.retry.delay_for(attempt);
                        warn!(
                            model = %self.name,
                            attempt = attempt + 1,
                            max_attempts = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Backend not ready, retrying: {}",
                            last_failure
                        );
                        metrics::counter!("modgate_backend_retries_total").increment(1);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(Error::unavailable(format!(
            "{} still unavailable after {} attempts: {}",
            self.name, attempts, last_failure
        )))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
}

#[derive(Debug, Serialize)]
struct InferenceParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
}

/// Zero-shot output: `labels[i]` is scored by `scores[i]`, best first
#[derive(Debug, Deserialize)]
struct ZeroShotOutput {
    labels: Vec<String>,
    scores: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
    #[serde(default)]
    estimated_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceReply {
    Single(ZeroShotOutput),
    Batch(Vec<ZeroShotOutput>),
    Error(ErrorReply),
}

/// What one attempt produced
#[derive(Debug)]
enum Outcome {
    Scores(Vec<ScorePair>),
    Transient(String),
    Failed(Error),
}

fn interpret_response(status: u16, body: &str) -> Outcome {
    if is_transient_status(status) {
        return Outcome::Transient(format!("HTTP {}: {}", status, body));
    }

    if !(200..300).contains(&status) {
        return Outcome::Failed(Error::upstream(status, body));
    }

    let reply: InferenceReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(e) => {
            return Outcome::Failed(Error::upstream(
                status,
                format!("Malformed response from backend ({}): {}", e, body),
            ))
        }
    };

    let output = match reply {
        InferenceReply::Single(output) => output,
        InferenceReply::Batch(mut outputs) if outputs.len() == 1 => outputs.remove(0),
        InferenceReply::Batch(outputs) => {
            return Outcome::Failed(Error::upstream(
                status,
                format!("Expected one result from backend, got {}", outputs.len()),
            ))
        }
        InferenceReply::Error(reply) if is_loading(&reply) => {
            return Outcome::Transient(format!("HTTP {}: {}", status, body))
        }
        InferenceReply::Error(reply) => {
            return Outcome::Failed(Error::upstream(status, reply.error))
        }
    };

    match pair_scores(output) {
        Ok(pairs) => Outcome::Scores(pairs),
        Err(message) => Outcome::Failed(Error::upstream(status, message)),
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 503 || status == 504
}

fn is_loading(reply: &ErrorReply) -> bool {
    reply.estimated_time.is_some() || reply.error.to_lowercase().contains("loading")
}

fn pair_scores(output: ZeroShotOutput) -> std::result::Result<Vec<ScorePair>, String> {
    if output.labels.len() != output.scores.len() {
        return Err(format!(
            "Backend returned {} labels but {} scores",
            output.labels.len(),
            output.scores.len()
        ));
    }

    Ok(output
        .labels
        .into_iter()
        .zip(output.scores)
        .map(|(label, score)| ScorePair { label, score })
        .collect())
}
