//! LLM integration crate for Lectern.
//!
//! This crate provides a provider-agnostic chat abstraction with tool
//! calling. It supports multiple providers through a unified trait-based
//! interface.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Gemini**: Google Generative Language API
//!
//! # Example
//! ```no_run
//! use lectern_llm::{ChatMessage, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("llama3.2").with_messages(vec![ChatMessage::user("Hello")]);
//! let response = client.complete(&request).await?;
//! println!("{:?}", response.completion);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod tools;
pub mod types;

// Re-export main types
pub use client::{
    ChatMessage, Completion, LlmClient, LlmRequest, LlmResponse, LlmUsage, Role, ToolCall,
    ToolChoice,
};
pub use factory::create_client;
pub use providers::{GeminiClient, OllamaClient};
pub use tools::{ParamKind, ToolDefinition, ToolParameter};
pub use types::ProviderType;
