//! Remote backend tests against a local inference API stand-in

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use modgate_classifiers::{RemoteClassifier, RetryPolicy, ZeroShotClassifier};
use modgate_core::Error;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Scripted upstream: replies with `script[n]` on the n-th call, repeating
/// the last entry once the script runs out.
struct Upstream {
    script: Vec<(StatusCode, Value)>,
    calls: AtomicU32,
    last_auth: std::sync::Mutex<Option<String>>,
    last_body: std::sync::Mutex<Option<Value>>,
}

async fn handle(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let n = upstream.calls.fetch_add(1, Ordering::SeqCst) as usize;
    *upstream.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *upstream.last_body.lock().unwrap() = Some(body);

    let (status, reply) = upstream.script[n.min(upstream.script.len() - 1)].clone();
    (status, Json(reply))
}

async fn spawn_upstream(script: Vec<(StatusCode, Value)>) -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream {
        script,
        calls: AtomicU32::new(0),
        last_auth: std::sync::Mutex::new(None),
        last_body: std::sync::Mutex::new(None),
    });

    let app = Router::new()
        .route("/models/org/nli", post(handle))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/models/org/nli", addr), upstream)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay_unit_ms: 5,
        max_delay_units: 3,
    }
}

fn classifier(url: String) -> RemoteClassifier {
    RemoteClassifier::new(
        "remote-nli",
        url,
        reqwest::Client::new(),
        SecretString::from("hf_secret".to_string()),
        fast_retry(),
    )
}

fn labels() -> Vec<String> {
    vec!["toxic".to_string(), "safe".to_string()]
}

fn success() -> Value {
    json!({"sequence": "hello", "labels": ["safe", "toxic"], "scores": [0.9, 0.1]})
}

#[tokio::test]
async fn test_success_sends_payload_and_token() {
    let (url, upstream) = spawn_upstream(vec![(StatusCode::OK, success())]).await;

    let pairs = classifier(url).classify("hello", &labels(), false).await.unwrap();

    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].label, "safe");
    assert_eq!(pairs[0].score, 0.9);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        upstream.last_auth.lock().unwrap().as_deref(),
        Some("Bearer hf_secret")
    );

    let body = upstream.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["inputs"], "hello");
    assert_eq!(body["parameters"]["candidate_labels"], json!(["toxic", "safe"]));
    assert_eq!(body["parameters"]["multi_label"], false);
}

#[tokio::test]
async fn test_persistent_overload_exhausts_attempts() {
    let (url, upstream) = spawn_upstream(vec![(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"error": "Service Unavailable"}),
    )])
    .await;

    let err = classifier(url).classify("hello", &labels(), true).await.unwrap_err();

    assert!(matches!(err, Error::BackendUnavailable(_)));
    assert!(err.to_string().contains("after 3 attempts"));
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_recovers_after_model_loads() {
    let (url, upstream) = spawn_upstream(vec![
        (
            StatusCode::OK,
            json!({"error": "Model org/nli is currently loading", "estimated_time": 12.5}),
        ),
        (StatusCode::GATEWAY_TIMEOUT, json!({"error": "timeout"})),
        (StatusCode::OK, success()),
    ])
    .await;

    let pairs = classifier(url).classify("hello", &labels(), true).await.unwrap();

    assert_eq!(pairs[0].label, "safe");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (url, upstream) = spawn_upstream(vec![(
        StatusCode::BAD_REQUEST,
        json!({"error": "candidate_labels must not be empty"}),
    )])
    .await;

    let err = classifier(url).classify("hello", &labels(), true).await.unwrap_err();

    match err {
        Error::Backend { status, message } => {
            assert_eq!(status, Some(400));
            assert!(message.contains("candidate_labels"));
        }
        other => panic!("expected backend error, got {other:?}"),
    }
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mismatched_lengths_fail_loudly() {
    let (url, upstream) = spawn_upstream(vec![(
        StatusCode::OK,
        json!({"labels": ["toxic", "safe"], "scores": [0.9]}),
    )])
    .await;

    let err = classifier(url).classify("hello", &labels(), true).await.unwrap_err();

    assert!(matches!(err, Error::Backend { .. }));
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_backend_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = classifier(format!("http://{}/models/org/nli", addr))
        .classify("hello", &labels(), true)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Backend { status: None, .. }));
}
