//! In-memory embedding index with optional SQLite persistence.
//!
//! Each course is held as an immutable entry behind an `Arc`. Re-ingesting a
//! course builds the replacement entry without holding the map lock and then
//! swaps it in, so searches only wait for the pointer swap.

use crate::chunker::chunk_document;
use crate::config::ChunkConfig;
use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::matching;
use crate::store::IndexStore;
use crate::types::{
    AddCourseOutcome, Course, CourseChunk, CourseDocument, CourseStats, SearchHit, SearchOutcome,
};
use lectern_core::{AppConfig, AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct IndexedChunk {
    chunk: CourseChunk,
    embedding: Vec<f32>,

    /// Global insertion order, used to break score ties
    seq: u64,
}

#[derive(Debug)]
struct CourseEntry {
    course: Course,
    content_hash: String,
    chunks: Vec<IndexedChunk>,
}

pub struct EmbeddingIndex {
    provider: Arc<dyn EmbeddingProvider>,
    store: Option<IndexStore>,
    chunk_config: ChunkConfig,
    max_results: usize,
    courses: RwLock<HashMap<String, Arc<CourseEntry>>>,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("provider", &self.provider.provider_name())
            .field("chunk_config", &self.chunk_config)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

impl EmbeddingIndex {
    /// An index that lives only in memory.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        chunk_config: ChunkConfig,
        max_results: usize,
    ) -> Self {
        Self {
            provider,
            store: None,
            chunk_config,
            max_results,
            courses: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Open the workspace index described by `config`.
    ///
    /// Only the RAG and embedding settings are read. The LLM provider is not
    /// checked, so ingestion and listing work without model credentials.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.rag.validate()?;

        let chunk_config = ChunkConfig::from_settings(&config.rag)?;
        let embedding_config =
            EmbeddingConfig::from_settings(&config.rag, config.provider_endpoint("ollama"));
        let provider = create_provider(&embedding_config).await?;

        let store = IndexStore::open(&config.index_path())?;
        Self::open(store, provider, chunk_config, config.rag.max_results)
    }

    /// An index backed by `store`, preloaded with the courses it holds.
    ///
    /// Stored courses embedded with a different model or dimension are left
    /// out; ingesting them again replaces the stale rows.
    pub fn open(
        store: IndexStore,
        provider: Arc<dyn EmbeddingProvider>,
        chunk_config: ChunkConfig,
        max_results: usize,
    ) -> AppResult<Self> {
        let stored = store.load_all()?;
        let mut index = Self::new(provider, chunk_config, max_results);

        let mut courses = HashMap::new();
        for entry in stored {
            let model_matches = entry.embedding_model == index.provider.model_name();
            let dims_match = entry
                .chunks
                .iter()
                .all(|(_, e)| e.len() == index.provider.dimensions());

            if !model_matches || !dims_match {
                tracing::warn!(
                    course = %entry.course.title,
                    stored_model = %entry.embedding_model,
                    "Skipping stored course embedded with a different model; re-ingest to refresh it"
                );
                continue;
            }

            let chunks = entry
                .chunks
                .into_iter()
                .map(|(chunk, embedding)| IndexedChunk {
                    chunk,
                    embedding,
                    seq: index.next_seq.fetch_add(1, Ordering::Relaxed),
                })
                .collect();

            courses.insert(
                entry.course.title.clone(),
                Arc::new(CourseEntry {
                    course: entry.course,
                    content_hash: entry.content_hash,
                    chunks,
                }),
            );
        }

        tracing::info!("Loaded {} courses from index store", courses.len());
        index.courses = RwLock::new(courses);
        index.store = Some(store);
        Ok(index)
    }

    /// Chunk, embed and store a course document, replacing any previous
    /// version of the same course.
    pub async fn add_course(&self, document: &CourseDocument) -> AppResult<AddCourseOutcome> {
        let title = document.course.title.clone();
        let hash = self.content_hash(document);

        let unchanged = self
            .courses
            .read()
            .await
            .get(&title)
            .map(|entry| entry.content_hash == hash)
            .unwrap_or(false);
        if unchanged {
            tracing::debug!(course = %title, "Course content unchanged, skipping");
            return Ok(AddCourseOutcome::Unchanged);
        }

        let chunks = chunk_document(document, &self.chunk_config);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.provider.embed_batch(&texts).await?
        };

        if embeddings.len() != chunks.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let pairs: Vec<(CourseChunk, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();

        if let Some(store) = &self.store {
            store.replace_course(&document.course, &hash, self.provider.model_name(), &pairs)?;
        }

        let chunk_count = pairs.len();
        let entry = CourseEntry {
            course: document.course.clone(),
            content_hash: hash,
            chunks: pairs
                .into_iter()
                .map(|(chunk, embedding)| IndexedChunk {
                    chunk,
                    embedding,
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                })
                .collect(),
        };

        self.courses.write().await.insert(title.clone(), Arc::new(entry));
        tracing::info!(course = %title, chunks = chunk_count, "Indexed course");

        Ok(AddCourseOutcome::Added {
            chunks: chunk_count,
        })
    }

    /// Top-k chunks by cosine similarity to `query`, best first.
    ///
    /// `k` defaults to the configured maximum. A `course_filter` is resolved
    /// to a canonical title first; one that does not resolve yields
    /// `SearchOutcome::NoMatchingCourse`.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        course_filter: Option<&str>,
        lesson_filter: Option<u32>,
    ) -> AppResult<SearchOutcome> {
        let k = k.unwrap_or(self.max_results);

        let course_title = match course_filter {
            Some(name) => match self.resolve_course_title(name).await {
                Some(title) => Some(title),
                None => return Ok(SearchOutcome::NoMatchingCourse(name.to_string())),
            },
            None => None,
        };

        if k == 0 {
            return Ok(SearchOutcome::Hits(Vec::new()));
        }

        let query_embedding = self
            .provider
            .embed(query)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to embed query: {}", e)))?;

        let entries: Vec<Arc<CourseEntry>> = {
            let courses = self.courses.read().await;
            match &course_title {
                Some(title) => courses.get(title).cloned().into_iter().collect(),
                None => courses.values().cloned().collect(),
            }
        };

        let mut scored: Vec<(&IndexedChunk, f32)> = entries
            .iter()
            .flat_map(|entry| entry.chunks.iter())
            .filter(|c| lesson_filter.is_none() || c.chunk.lesson_number == lesson_filter)
            .map(|c| (c, cosine_similarity(&query_embedding, &c.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.seq.cmp(&b.0.seq)));
        scored.truncate(k);

        tracing::debug!(
            query,
            course = ?course_title,
            lesson = ?lesson_filter,
            hits = scored.len(),
            "Search complete"
        );

        Ok(SearchOutcome::Hits(
            scored
                .into_iter()
                .map(|(c, score)| SearchHit {
                    chunk: c.chunk.clone(),
                    score,
                })
                .collect(),
        ))
    }

    /// Resolve a fuzzy course name to a canonical title.
    pub async fn resolve_course_title(&self, name: &str) -> Option<String> {
        let courses = self.courses.read().await;
        matching::resolve_title(name, courses.keys().map(String::as_str))
    }

    /// Known course titles, sorted.
    pub async fn course_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self.courses.read().await.keys().cloned().collect();
        titles.sort();
        titles
    }

    /// Course count and sorted titles.
    pub async fn stats(&self) -> CourseStats {
        let course_titles = self.course_titles().await;
        CourseStats {
            total_courses: course_titles.len(),
            course_titles,
        }
    }

    pub async fn chunk_count(&self) -> usize {
        self.courses
            .read()
            .await
            .values()
            .map(|entry| entry.chunks.len())
            .sum()
    }

    pub async fn course(&self, title: &str) -> Option<Course> {
        self.courses
            .read()
            .await
            .get(title)
            .map(|entry| entry.course.clone())
    }

    /// Remove every course from memory and from the store.
    pub async fn clear(&self) -> AppResult<()> {
        if let Some(store) = &self.store {
            store.clear()?;
        }
        self.courses.write().await.clear();
        Ok(())
    }

    fn content_hash(&self, document: &CourseDocument) -> String {
        let course = &document.course;
        let mut hasher = Sha256::new();

        let mut field = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        };

        field(&course.title);
        field(course.instructor.as_deref().unwrap_or(""));
        field(course.link.as_deref().unwrap_or(""));
        for lesson in &course.lessons {
            field(&lesson.number.to_string());
            field(&lesson.title);
            field(lesson.link.as_deref().unwrap_or(""));
        }
        field(&document.course_text);
        for section in &document.sections {
            field(&section.number.to_string());
            field(&section.body);
        }
        field(&self.chunk_config.chunk_size().to_string());
        field(&self.chunk_config.chunk_overlap().to_string());
        field(self.provider.model_name());

        format!("{:x}", hasher.finalize())
    }
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
