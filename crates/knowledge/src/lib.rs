//! Course knowledge base and query pipeline.
//!
//! Course documents are parsed, chunked and embedded into an
//! [`EmbeddingIndex`] persisted in SQLite. [`RagSystem`] answers questions
//! by letting the model search that index through a tool.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod matching;
pub mod parser;
pub mod rag;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::ChunkConfig;
pub use index::EmbeddingIndex;
pub use rag::{QueryResponse, RagSystem, SessionStore, Source, Turn, TurnRole};
pub use store::IndexStore;
pub use types::{
    AddCourseOutcome, Course, CourseChunk, CourseDocument, CourseStats, IngestReport, Lesson,
    SearchHit, SearchOutcome, SkippedDocument,
};
