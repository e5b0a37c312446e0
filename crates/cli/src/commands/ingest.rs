//! Ingest command handler.
//!
//! Loads course documents into the on-disk index. Only the embedding
//! settings are needed; the LLM provider is never contacted.

use clap::Args;
use lectern_core::{config::AppConfig, AppResult};
use lectern_knowledge::{ingest, EmbeddingIndex};
use std::path::PathBuf;

/// Index course documents from a file or folder
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// File or folder to ingest (default: the configured docs folder)
    pub path: Option<PathBuf>,

    /// Remove every indexed course first
    #[arg(long)]
    pub clear: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let path = self.path.clone().unwrap_or_else(|| config.docs_dir());
        tracing::info!("Ingesting from {:?}", path);

        let index = EmbeddingIndex::from_config(config).await?;

        let report = if path.is_file() {
            if self.clear {
                index.clear().await?;
            }
            ingest::ingest_document(&index, &path).await?
        } else {
            ingest::ingest_folder(&index, &path, self.clear).await?
        };

        if self.json {
            return super::print_json(&report);
        }

        println!(
            "Added {} course(s) ({} chunks); {} unchanged",
            report.courses_added,
            report.chunks_added,
            report.unchanged.len()
        );
        for title in &report.unchanged {
            println!("  unchanged: {}", title);
        }
        for skipped in &report.skipped {
            println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
        }

        let stats = index.stats().await;
        println!("{} course(s) in the index", stats.total_courses);
        Ok(())
    }
}
