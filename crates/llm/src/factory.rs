//! LLM provider factory.
//!
//! This module creates LLM clients from a provider name plus the endpoint,
//! secret and timeout resolved from application configuration.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Request timeout used when the configuration does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "gemini")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (required by Gemini)
/// * `timeout_secs` - Optional per-request timeout
///
/// # Errors
/// Returns error if the provider is unknown or a required secret is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    let api_key = api_key.filter(|k| !k.trim().is_empty());
    if provider_type.requires_api_key() && api_key.is_none() {
        return Err(format!(
            "Provider '{}' requires API key",
            provider_type.as_str()
        ));
    }

    let base_url = endpoint.unwrap_or(provider_type.default_endpoint());
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_options(base_url, timeout))),
        ProviderType::Gemini => Ok(Arc::new(GeminiClient::with_options(
            base_url,
            api_key.unwrap_or_default(),
            timeout,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None, Some(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_gemini_requires_api_key() {
        match create_client("gemini", None, None, None) {
            Err(err) => assert!(err.contains("requires API key")),
            Ok(_) => panic!("Expected error for Gemini without API key"),
        }
    }

    #[test]
    fn test_gemini_rejects_blank_api_key() {
        match create_client("gemini", None, Some("   "), None) {
            Err(err) => assert!(err.contains("'gemini' requires API key")),
            Ok(_) => panic!("Expected error for blank Gemini API key"),
        }
    }

    #[test]
    fn test_create_gemini_client() {
        let client = create_client("gemini", None, Some("test-key"), None).unwrap();
        assert_eq!(client.provider_name(), "gemini");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
