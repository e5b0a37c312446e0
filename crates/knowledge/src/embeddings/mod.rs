//! Embedding providers.
//!
//! Chunk and query text is turned into fixed-length vectors through the
//! `EmbeddingProvider` boundary. The offline `trigram` provider is the
//! default; `ollama` calls a local embedding model.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{OllamaProvider, TrigramProvider};
