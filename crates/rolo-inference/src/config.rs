//! Generation backend configuration.
//!
//! Loaded from environment variables with defaults from
//! [`rolo_core::defaults`].

use std::env;

use tracing::debug;

use rolo_core::defaults;

/// Settings for the Ollama chat backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server, without trailing slash.
    pub base_url: String,
    /// Generation model name.
    pub model: String,
    /// HTTP timeout per request (seconds).
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OLLAMA_URL.to_string(),
            model: defaults::GEN_MODEL.to_string(),
            timeout_secs: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_BASE`, `ROLO_GEN_MODEL` and `ROLO_GEN_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let base_url = env::var("OLLAMA_BASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::OLLAMA_URL.to_string());
        let model = env::var("ROLO_GEN_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::GEN_MODEL.to_string());
        let timeout_secs = env::var("ROLO_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults::GEN_TIMEOUT_SECS);

        let config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout_secs,
        };
        debug!(
            subsystem = "inference",
            base_url = %config.base_url,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Loaded generation config"
        );
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
