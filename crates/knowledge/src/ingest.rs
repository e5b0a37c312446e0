//! Loading course documents from disk into an [`EmbeddingIndex`].
//!
//! Nothing here touches the LLM, so ingestion works with only the
//! embedding settings configured.

use crate::index::EmbeddingIndex;
use crate::parser;
use crate::types::{AddCourseOutcome, CourseDocument, IngestReport, SkippedDocument};
use lectern_core::{AppError, AppResult};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Parse and index one course document.
///
/// Unlike folder ingestion, a file that cannot be parsed is an error.
pub async fn ingest_document(index: &EmbeddingIndex, path: &Path) -> AppResult<IngestReport> {
    let document = parser::parse_file(path)?;
    let mut report = IngestReport::default();
    add_to_report(index, document, &mut report).await?;
    Ok(report)
}

/// Index every supported document under `dir`.
///
/// Unsupported or malformed files are reported in `skipped` and do not
/// stop the batch. Storage and embedding failures do.
pub async fn ingest_folder(
    index: &EmbeddingIndex,
    dir: &Path,
    clear_existing: bool,
) -> AppResult<IngestReport> {
    if !dir.is_dir() {
        return Err(AppError::Ingestion(format!(
            "Folder not found: {}",
            dir.display()
        )));
    }

    if clear_existing {
        tracing::info!("Clearing existing courses before ingestion");
        index.clear().await?;
    }

    let mut report = IngestReport::default();

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                tracing::warn!("Cannot read {:?}: {}", path, e);
                report.skipped.push(SkippedDocument {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !parser::is_supported(path) {
            report.skipped.push(SkippedDocument {
                path: path.to_path_buf(),
                reason: "unsupported file type".to_string(),
            });
            continue;
        }

        match parser::parse_file(path) {
            Ok(document) => add_to_report(index, document, &mut report).await?,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                report.skipped.push(SkippedDocument {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        added = report.courses_added,
        chunks = report.chunks_added,
        unchanged = report.unchanged.len(),
        skipped = report.skipped.len(),
        "Ingestion finished"
    );

    Ok(report)
}

async fn add_to_report(
    index: &EmbeddingIndex,
    document: CourseDocument,
    report: &mut IngestReport,
) -> AppResult<()> {
    match index.add_course(&document).await? {
        AddCourseOutcome::Added { chunks } => {
            report.courses_added += 1;
            report.chunks_added += chunks;
        }
        AddCourseOutcome::Unchanged => report.unchanged.push(document.course.title),
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
