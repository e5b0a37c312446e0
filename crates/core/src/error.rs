//! Error types for Lectern.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! LLM transport, knowledge storage, ingestion, retrieval, generation and
//! prompt failures.

use thiserror::Error;

/// Unified error type for Lectern.
///
/// Recoverable conditions inside the query pipeline (no search hits, an
/// unresolvable course filter, an unknown session id) never surface as an
/// `AppError`; they are turned into values the caller can inspect. Only the
/// variants below cross component boundaries.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider transport or protocol errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Index storage and embedding provider errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// A course document could not be ingested (e.g. malformed header)
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// The embedding index could not serve a search
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The generator loop could not produce an answer
    #[error("Generation error: {0}")]
    Generation(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// A short, human-readable hint for common provider failures.
    pub fn hint(&self) -> Option<&'static str> {
        let message = match self {
            AppError::Llm(m) | AppError::Generation(m) | AppError::Knowledge(m) => {
                m.to_lowercase()
            }
            _ => return None,
        };

        if message.contains("api key")
            || message.contains("unauthorized")
            || message.contains("401")
            || message.contains("authentication")
        {
            Some("Authentication failed. Check the API key environment variable for the active provider.")
        } else if message.contains("quota") || message.contains("429") || message.contains("rate limit") {
            Some("The provider rejected the request for quota or rate-limit reasons. Retry later.")
        } else if message.contains("timed out") || message.contains("timeout") {
            Some("The request timed out. Check the provider endpoint and network.")
        } else if message.contains("connect") || message.contains("network") {
            Some("Could not reach the provider. Check the endpoint URL and that the service is running.")
        } else {
            None
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
