//! modgate HTTP server
//!
//! Exposes zero-shot moderation over HTTP:
//! `POST /classify`, `GET /health`, `GET /models`, and `GET /metrics`.

pub mod config;
pub mod routes;
pub mod state;

pub use config::{CorsConfig, ListenConfig, Overrides, ServerConfig};
pub use routes::create_router;
pub use state::AppState;
