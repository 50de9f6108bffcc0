//! Integration tests for the modgate HTTP surface

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use modgate_classifiers::config::{LocalModelSpec, RemoteModelSpec};
use modgate_classifiers::{BackendFactory, BackendKind, ModelCatalog, ModelSpec, ZeroShotClassifier};
use modgate_core::{Error, Result, ScorePair};
use modgate_server::{create_router, AppState, Overrides, ServerConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Scores "toxic" high for texts containing "idiot", "safe" high otherwise
struct KeywordClassifier {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl ZeroShotClassifier for KeywordClassifier {
    async fn classify(&self, text: &str, labels: &[String], _multi_label: bool) -> Result<Vec<ScorePair>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hostile = text.contains("idiot");
        let mut pairs: Vec<ScorePair> = labels
            .iter()
            .map(|label| {
                let score = match (label.as_str(), hostile) {
                    ("toxic", true) | ("safe", false) => 0.9,
                    ("toxic", false) | ("safe", true) => 0.05,
                    _ => 0.2,
                };
                ScorePair::new(label.clone(), score)
            })
            .collect();
        pairs.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(pairs)
    }

    fn name(&self) -> &str {
        "keyword"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

/// Remote stand-in that is never ready
struct OverloadedClassifier;

#[async_trait]
impl ZeroShotClassifier for OverloadedClassifier {
    async fn classify(&self, _text: &str, _labels: &[String], _multi_label: bool) -> Result<Vec<ScorePair>> {
        Err(Error::unavailable("remote-nli still unavailable after 3 attempts: HTTP 503"))
    }

    fn name(&self) -> &str {
        "overloaded"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }
}

struct TestFactory {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl BackendFactory for TestFactory {
    async fn build(&self, _model_id: &str, spec: &ModelSpec) -> Result<Arc<dyn ZeroShotClassifier>> {
        match spec {
            ModelSpec::Local(_) => Ok(Arc::new(KeywordClassifier {
                calls: self.calls.clone(),
            })),
            ModelSpec::Remote(_) => Ok(Arc::new(OverloadedClassifier)),
        }
    }
}

fn test_config(hf_token: Option<&str>) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.classifiers.models = ModelCatalog::new()
        .with_model("local-nli", ModelSpec::Local(LocalModelSpec::new("org/local-nli")))
        .with_model("remote-nli", ModelSpec::Remote(RemoteModelSpec::new("org/remote-nli")));
    config.classifiers.service.default_model = "local-nli".to_string();

    config
        .apply(Overrides {
            hf_token: hf_token.map(str::to_string),
            cors_origins: Some(vec!["https://app.example.com".to_string()]),
            ..Overrides::default()
        })
        .unwrap()
}

async fn test_app(hf_token: Option<&str>) -> (Router, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let factory = Arc::new(TestFactory {
        calls: calls.clone(),
    });
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let state = AppState::with_factory(test_config(hf_token), factory, handle)
        .await
        .unwrap();
    (create_router(state), calls)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_classify(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/classify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app(Some("hf_test")).await;
    let (status, body) = send(app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_health_warns_without_token() {
    let (app, _) = test_app(None).await;
    let (status, body) = send(app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["warning"].as_str().unwrap().contains("HF_TOKEN"));
}

#[tokio::test]
async fn test_classify_picks_toxic() {
    let (app, calls) = test_app(Some("hf_test")).await;
    let request = post_classify(json!({
        "texts": ["you are an idiot", "have a nice day"],
        "labels": ["toxic", "safe"],
        "threshold": 0.7
    }));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["text"], "you are an idiot");
    assert_eq!(results[0]["picked"][0]["label"], "toxic");
    assert_eq!(results[0]["picked"].as_array().unwrap().len(), 1);
    assert_eq!(results[0]["all"].as_array().unwrap().len(), 2);
    assert_eq!(results[1]["picked"][0]["label"], "safe");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_classify_fallback_above_every_score() {
    let (app, _) = test_app(Some("hf_test")).await;
    let request = post_classify(json!({
        "texts": ["you are an idiot"],
        "labels": ["toxic", "safe"],
        "threshold": 0.95
    }));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let picked = body["results"][0]["picked"].as_array().unwrap();
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0]["label"], "toxic");
}

#[tokio::test]
async fn test_blank_texts_rejected() {
    let (app, calls) = test_app(Some("hf_test")).await;
    let (status, body) = send(app, post_classify(json!({"texts": ["", "   "]}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No texts provided.");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_model_rejected() {
    let (app, _) = test_app(Some("hf_test")).await;
    let request = post_classify(json!({"texts": ["hello"], "model": "gpt-judge"}));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("gpt-judge"));
}

#[tokio::test]
async fn test_unavailable_backend_is_503() {
    let (app, _) = test_app(Some("hf_test")).await;
    let request = post_classify(json!({"texts": ["hello"], "model": "remote-nli"}));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let (app, _) = test_app(Some("hf_test")).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/classify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"texts\": 42}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_models_listing() {
    let (app, _) = test_app(Some("hf_test")).await;
    let (status, body) = send(app, get("/models")).await;

    assert_eq!(status, StatusCode::OK);
    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["id"], "local-nli");
    assert_eq!(models[0]["backend"], "local");
    assert_eq!(models[0]["default"], true);
    assert_eq!(models[0]["loaded"], false);
    assert_eq!(models[1]["repo"], "org/remote-nli");
    assert_eq!(models[1]["default"], false);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = test_app(Some("hf_test")).await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/classify")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
        .is_none());
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = test_app(Some("hf_test")).await;
    let (status, _) = send(app, get("/v1/chat/completions")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
