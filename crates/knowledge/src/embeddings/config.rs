//! Embedding configuration.

use lectern_core::{AppError, AppResult, RagSettings};
use serde::{Deserialize, Serialize};

/// Providers `create_provider` can build.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Embedding provider selection and parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Base URL for HTTP providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Build from application settings; `endpoint` comes from the Ollama
    /// provider section when one is configured.
    pub fn from_settings(settings: &RagSettings, endpoint: Option<String>) -> Self {
        Self {
            provider: settings.embedding_provider.clone(),
            model: settings.embedding_model.clone(),
            dimensions: settings.embedding_dim,
            endpoint,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Knowledge(format!(
                "Unknown embedding provider: '{}'. Supported providers: {}",
                self.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.dimensions == 0 {
            return Err(AppError::Knowledge(
                "Embedding dimensions must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Knowledge("Embedding model must not be empty".to_string()));
        }

        Ok(())
    }
}
