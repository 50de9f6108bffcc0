//! HTTP routes and handlers

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use modgate_classifiers::ModelInfo;
use modgate_core::{ClassifyRequest, ClassifyResponse, Error};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::CorsConfig;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(health_check))
        .route("/classify", post(classify))
        .route("/models", get(list_models))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allows_any() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    if state.config.missing_token() {
        return Json(json!({
            "status": "ok",
            "warning": "HF_TOKEN is not set; remote models are unavailable",
        }));
    }
    Json(json!({ "status": "ok" }))
}

async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    metrics::counter!("modgate_requests_total").increment(1);

    let response = state.service.classify(request).await.map_err(|err| {
        metrics::counter!("modgate_errors_total", "kind" => err.kind()).increment(1);
        if err.is_client_error() {
            warn!("Rejected classification request: {}", err);
        } else {
            error!("Classification failed: {}", err);
        }
        AppError(err)
    })?;

    Ok(Json(response))
}

/// Catalog entry with its default marker
#[derive(Debug, Serialize)]
struct ModelEntry {
    #[serde(flatten)]
    info: ModelInfo,
    default: bool,
}

async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let registry = state.service.registry();
    let default_model = &state.service.config().default_model;
    let default_id = registry
        .catalog()
        .lookup(default_model)
        .map(|(id, _)| id.to_string());

    let models: Vec<ModelEntry> = registry
        .models()
        .await
        .into_iter()
        .map(|info| {
            let default = default_id.as_deref() == Some(info.id.as_str());
            ModelEntry { info, default }
        })
        .collect();

    Json(json!({ "models": models }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn fallback() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

/// Error handling
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

/// HTTP status for a service error
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) | Error::UnknownModel(_) => StatusCode::BAD_REQUEST,
        Error::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Backend {
            status: Some(status),
            ..
        } => StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        Error::Backend { status: None, .. }
        | Error::Config(_)
        | Error::Serialization(_)
        | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = json!({ "detail": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
