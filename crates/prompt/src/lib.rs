//! Prompt system for Lectern.
//!
//! This crate provides the system prompt used by the course assistant:
//! - A built-in default definition
//! - YAML overrides from `.lectern/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_system_prompt;
pub use loader::{default_prompt, list_prompts, load_or_default, load_prompt, DEFAULT_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition};
