//! Server configuration

use modgate_classifiers::ClassifierConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Request defaults, model catalog, and remote inference settings
    #[serde(flatten)]
    pub classifiers: ClassifierConfig,

    /// Listen address
    #[serde(default)]
    pub listen: ListenConfig,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Models to construct before accepting requests
    #[serde(default)]
    pub preload: Vec<String>,

    /// Hosted inference API token; only ever set from the environment or CLI
    #[serde(skip)]
    pub hf_token: Option<SecretString>,
}

/// Values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub default_threshold: Option<f32>,
    pub default_model: Option<String>,
    pub max_texts: Option<usize>,
    pub cors_origins: Option<Vec<String>>,
    pub hf_token: Option<String>,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, overrides: Overrides) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply(overrides)
    }

    /// Apply overrides and validate the result
    pub fn apply(mut self, overrides: Overrides) -> anyhow::Result<Self> {
        if let Some(address) = overrides.address {
            self.listen.address = address;
        }
        if let Some(port) = overrides.port {
            self.listen.port = port;
        }

        let service = &mut self.classifiers.service;
        if let Some(threshold) = overrides.default_threshold {
            service.default_threshold = threshold;
        }
        if let Some(model) = overrides.default_model {
            service.default_model = model;
        }
        if let Some(max_texts) = overrides.max_texts {
            service.max_texts = max_texts;
        }

        if let Some(origins) = overrides.cors_origins {
            self.cors.allowed_origins = origins
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        self.hf_token = overrides
            .hf_token
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        self.classifiers.validate()?;
        Ok(self)
    }

    /// Remote models are configured but no token is available
    pub fn missing_token(&self) -> bool {
        self.hf_token.is_none() && self.classifiers.models.has_remote()
    }
}

/// Listen address
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

/// Cross-origin resource sharing policy
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any origin
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_origins(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}
