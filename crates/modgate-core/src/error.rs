//! Error types for modgate

/// Result type alias using modgate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for modgate operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request failed normalization (no texts, no labels, bad threshold)
    #[error("{0}")]
    Validation(String),

    /// Model identifier is not part of the configured catalog
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// Required configuration or credential is missing
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-transient backend failure.
    ///
    /// `status` is the upstream HTTP status for remote backends and `None`
    /// for in-process failures or transport errors.
    #[error("backend error: {message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },

    /// Transient backend failure that outlived the retry budget
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new unknown-model error
    pub fn unknown_model(id: impl Into<String>) -> Self {
        Self::UnknownModel(id.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a backend error without an upstream status
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: msg.into(),
        }
    }

    /// Create a backend error carrying the upstream status and body
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Backend {
            status: Some(status),
            message: body.into(),
        }
    }

    /// Create a new backend-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownModel(_) => "unknown_model",
            Self::Config(_) => "config",
            Self::Backend { .. } => "backend",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the caller caused this error
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnknownModel(_))
    }
}
