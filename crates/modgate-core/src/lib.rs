//! modgate core
//!
//! Types and errors shared across modgate components.
//!
//! This crate provides:
//! - The classification request/response model exchanged over HTTP
//! - The score pair produced by zero-shot backends
//! - The error taxonomy used by every layer

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ClassifyItem, ClassifyRequest, ClassifyResponse, ScorePair, DEFAULT_LABELS};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassifyItem, ClassifyRequest, ClassifyResponse, ScorePair};
}
