//! Configuration management for Lectern.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - The workspace config file (`.lectern/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.lectern/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "gemini"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .lectern/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("ollama", "gemini")
    pub provider: String,

    /// Model identifier for the active provider
    pub model: String,

    /// API key override for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmSection>,

    /// Retrieval and conversation settings
    pub rag: RagSettings,
}

/// LLM section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Gemini {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Gemini { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Gemini { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint),
        }
    }

    pub fn timeout(&self) -> Option<u64> {
        match self {
            ProviderConfig::Gemini { timeout, .. } | ProviderConfig::Ollama { timeout, .. } => {
                *timeout
            }
        }
    }
}

/// Retrieval, chunking and conversation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RagSettings {
    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Characters repeated from the previous chunk
    pub chunk_overlap: usize,

    /// Default number of search results
    pub max_results: usize,

    /// Number of user/assistant exchanges remembered per session
    pub max_history: usize,

    /// Embedding provider ("trigram", "ollama")
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Embedding vector dimension
    pub embedding_dim: usize,

    /// Folder with course documents, relative to the workspace
    pub docs_path: PathBuf,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            max_results: 5,
            max_history: 2,
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            embedding_dim: 384,
            docs_path: PathBuf::from("docs"),
        }
    }
}

impl RagSettings {
    /// Check the invariants the chunker and index rely on.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.max_results == 0 {
            return Err(AppError::Config("maxResults must be greater than 0".to_string()));
        }
        if self.embedding_dim == 0 {
            return Err(AppError::Config("embeddingDim must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    rag: Option<RagSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            rag: RagSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the workspace config file and environment.
    ///
    /// Environment variables:
    /// - `LECTERN_WORKSPACE`: Override workspace path
    /// - `LECTERN_CONFIG`: Path to config file
    /// - `LECTERN_PROVIDER`: LLM provider
    /// - `LECTERN_MODEL`: Model identifier
    /// - `LECTERN_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use lectern_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration for a workspace and config file chosen on the
    /// command line.
    ///
    /// Both arguments take precedence over `LECTERN_WORKSPACE` and
    /// `LECTERN_CONFIG`. The config file is read from the resolved location,
    /// so it must be known before anything is merged. An explicitly named
    /// config file that does not exist is an error; a missing
    /// `.lectern/config.yaml` is not.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("LECTERN_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("LECTERN_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        match config.config_file.clone() {
            Some(path) if !path.exists() => {
                return Err(AppError::Config(format!(
                    "Config file does not exist: {:?}",
                    path
                )));
            }
            Some(path) => config = config.merge_yaml(&path)?,
            None => {
                let path = config.lectern_dir().join("config.yaml");
                if path.exists() {
                    config = config.merge_yaml(&path)?;
                }
            }
        }

        if let Ok(provider) = std::env::var("LECTERN_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("LECTERN_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("LECTERN_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            } else if llm.active_provider == "gemini" {
                result.model = "gemini-2.5-flash".to_string();
            }

            result.llm = Some(llm);
        }

        tracing::debug!("Merged configuration from {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Workspace and config file flags are not accepted here; pass them to
    /// [`AppConfig::load_from`] so the right file gets merged.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .lectern directory.
    pub fn lectern_dir(&self) -> PathBuf {
        self.workspace.join(".lectern")
    }

    /// Ensure the .lectern directory exists.
    pub fn ensure_lectern_dir(&self) -> AppResult<()> {
        let dir = self.lectern_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .lectern directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Path of the durable chunk/catalog store.
    pub fn index_path(&self) -> PathBuf {
        self.lectern_dir().join("index.sqlite")
    }

    /// Folder that holds course documents.
    pub fn docs_dir(&self) -> PathBuf {
        if self.rag.docs_path.is_absolute() {
            self.rag.docs_path.clone()
        } else {
            self.workspace.join(&self.rag.docs_path)
        }
    }

    /// Get a provider's configuration from config.yaml.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint configured for a provider, if any.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|p| p.endpoint())
            .map(str::to_string)
    }

    /// Request timeout configured for a provider, if any.
    pub fn provider_timeout(&self, provider: &str) -> Option<u64> {
        self.get_provider_config(provider).and_then(|p| p.timeout())
    }

    /// Environment variable holding a provider's API key.
    fn api_key_env(&self, provider: &str) -> Option<String> {
        match self.get_provider_config(provider) {
            Some(ProviderConfig::Gemini { api_key_env, .. }) => Some(api_key_env.clone()),
            Some(ProviderConfig::Ollama { .. }) => None,
            None if provider == "gemini" => Some("GEMINI_API_KEY".to_string()),
            None => None,
        }
    }

    /// Resolve the API key for a provider.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        self.api_key_env(provider)
            .and_then(|env_var| std::env::var(env_var).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model must not be empty".to_string()));
        }

        if let Some(env_var) = self.api_key_env(provider) {
            if self.resolve_api_key(provider).is_none() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    env_var
                )));
            }
        }

        self.rag.validate()
    }

    /// Render the effective configuration for display.
    ///
    /// With `hide_sensitive`, the API key is reduced to its first 8 characters.
    pub fn summary(&self, hide_sensitive: bool) -> String {
        let api_key = match self.resolve_api_key(&self.provider) {
            Some(key) if hide_sensitive => {
                if key.chars().count() > 8 {
                    format!("{}...", key.chars().take(8).collect::<String>())
                } else {
                    "****".to_string()
                }
            }
            Some(key) => key,
            None => "(not set)".to_string(),
        };

        let mut out = String::new();
        out.push_str("=== Lectern configuration ===\n");
        out.push_str(&format!("Workspace: {}\n", self.workspace.display()));
        out.push_str(&format!("Provider: {}\n", self.provider));
        out.push_str(&format!("Model: {}\n", self.model));
        out.push_str(&format!("API key: {}\n", api_key));
        out.push_str(&format!(
            "Embeddings: {} ({}, {} dims)\n",
            self.rag.embedding_provider, self.rag.embedding_model, self.rag.embedding_dim
        ));
        out.push_str(&format!("Chunk size: {}\n", self.rag.chunk_size));
        out.push_str(&format!("Chunk overlap: {}\n", self.rag.chunk_overlap));
        out.push_str(&format!("Max results: {}\n", self.rag.max_results));
        out.push_str(&format!("Max history: {}\n", self.rag.max_history));
        out.push_str(&format!("Docs: {}\n", self.docs_dir().display()));
        out.push_str(&format!("Index: {}\n", self.index_path().display()));
        out
    }
}
