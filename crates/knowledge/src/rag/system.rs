//! Query orchestration over the index, sessions and generator.

use crate::index::EmbeddingIndex;
use crate::ingest;
use crate::rag::generator::Generator;
use crate::rag::session::SessionStore;
use crate::rag::tool::{CourseSearchTool, ToolRegistry, SEARCH_TOOL_NAME};
use crate::rag::types::QueryResponse;
use crate::types::{CourseStats, IngestReport};
use lectern_core::{AppConfig, AppError, AppResult};
use lectern_llm::{create_client, LlmClient};
use lectern_prompt::{build_system_prompt, load_or_default, DEFAULT_PROMPT_ID};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Entry point for ingestion and question answering.
pub struct RagSystem {
    index: Arc<EmbeddingIndex>,
    sessions: SessionStore,
    generator: Generator,
}

impl RagSystem {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        max_history: usize,
    ) -> AppResult<Self> {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CourseSearchTool::new(index.clone())?))?;

        Ok(Self {
            index,
            sessions: SessionStore::new(max_history),
            generator: Generator::new(client, model, system_prompt, tools),
        })
    }

    /// Wire every component from configuration: the on-disk index under
    /// `.lectern/`, the LLM client and the system prompt.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let index = Arc::new(EmbeddingIndex::from_config(config).await?);

        let provider_name = config.provider.as_str();
        let client = create_client(
            provider_name,
            config.provider_endpoint(provider_name).as_deref(),
            config.resolve_api_key(provider_name).as_deref(),
            config.provider_timeout(provider_name),
        )
        .map_err(AppError::Config)?;

        let definition = load_or_default(&config.workspace, DEFAULT_PROMPT_ID)?;
        let mut variables = HashMap::new();
        variables.insert("tool_name".to_string(), SEARCH_TOOL_NAME.to_string());
        let prompt = build_system_prompt(&definition, variables)?;

        tracing::info!(
            provider = provider_name,
            model = %config.model,
            prompt = %prompt.metadata.source_prompt_id,
            "RAG system ready"
        );

        Self::new(
            index,
            client,
            config.model.clone(),
            prompt.system,
            config.rag.max_history,
        )
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer one query within a session.
    ///
    /// A missing or blank `session_id` starts a new session. The exchange is
    /// recorded only when an answer was produced.
    pub async fn handle_query(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> AppResult<QueryResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Other("Query must not be empty".to_string()));
        }

        let session_id = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.sessions.create().await,
        };

        // Queries in one session run one at a time so each sees the last answer.
        let mut session = self.sessions.lock(&session_id).await;
        tracing::info!(session = %session_id, history = session.turns().len(), "Handling query");

        let answer = self.generator.generate(query, session.turns()).await?;
        session.record_exchange(query, answer.text.clone());

        Ok(QueryResponse {
            answer: answer.text,
            sources: answer.sources.unwrap_or_default(),
            session_id,
        })
    }

    pub async fn get_course_stats(&self) -> CourseStats {
        self.index.stats().await
    }

    /// Parse and index a single course document.
    pub async fn add_course_document(&self, path: &Path) -> AppResult<IngestReport> {
        ingest::ingest_document(&self.index, path).await
    }

    /// Index every supported document under `dir`.
    pub async fn add_course_folder(
        &self,
        dir: &Path,
        clear_existing: bool,
    ) -> AppResult<IngestReport> {
        ingest::ingest_folder(&self.index, dir, clear_existing).await
    }

    /// Forget every conversation.
    pub async fn reset_sessions(&self) {
        self.sessions.reset().await;
    }
}
