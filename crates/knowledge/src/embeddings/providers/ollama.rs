//! Ollama embedding provider.
//!
//! Calls the `/api/embed` endpoint of a local Ollama server with a batch of
//! inputs per request. Failed requests are retried with exponential backoff.
//!
//! The base URL is taken from the configuration, then `OLLAMA_URL`, then
//! `http://localhost:11434`.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use lectern_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBED_PATH: &str = "/api/embed";
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Build the provider and run one probe embedding so a missing server or
    /// model surfaces at startup instead of during ingestion.
    pub async fn new(config: EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let provider = Self {
            client,
            base_url,
            model: config.model,
            dimensions: config.dimensions,
        };

        provider.verify_connection().await?;
        Ok(provider)
    }

    #[instrument(skip(self), fields(model = %self.model))]
    async fn verify_connection(&self) -> AppResult<()> {
        debug!("Probing Ollama embeddings at {}", self.base_url);

        self.request_with_retries(&["connection probe".to_string()])
            .await
            .map_err(|e| {
                AppError::Knowledge(format!(
                    "Ollama embeddings unavailable at {} ({}). Is the server running? Try: ollama pull {}",
                    self.base_url, e, self.model
                ))
            })?;

        Ok(())
    }

    async fn request_with_retries(&self, inputs: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request(inputs).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding request failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, MAX_ATTEMPTS, backoff_ms, e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request(&self, inputs: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}{}", self.base_url, EMBED_PATH);
        let body = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(AppError::Knowledge(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Invalid Ollama response: {}", e)))?;

        if parsed.embeddings.len() != inputs.len() {
            return Err(AppError::Knowledge(format!(
                "Ollama returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                inputs.len()
            )));
        }

        if let Some(bad) = parsed.embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(AppError::Knowledge(format!(
                "Model '{}' returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Blank inputs are rejected by some models; they embed to zero.
        let (indices, inputs): (Vec<usize>, Vec<String>) = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.clone()))
            .unzip();

        let mut out = vec![vec![0.0; self.dimensions]; texts.len()];
        if inputs.is_empty() {
            return Ok(out);
        }

        let embedded = self.request_with_retries(&inputs).await?;
        for (i, embedding) in indices.into_iter().zip(embedded) {
            out[i] = embedding;
        }

        debug!("Embedded {} texts", texts.len());
        Ok(out)
    }
}
