//! Courses command handler.

use clap::Args;
use lectern_core::{config::AppConfig, AppResult};
use lectern_knowledge::EmbeddingIndex;

/// List indexed courses
#[derive(Args, Debug)]
pub struct CoursesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CoursesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = EmbeddingIndex::from_config(config).await?;
        let stats = index.stats().await;

        if self.json {
            return super::print_json(&stats);
        }

        if stats.total_courses == 0 {
            println!("No courses indexed. Run 'lectern ingest' to add some.");
            return Ok(());
        }

        println!("{} course(s):", stats.total_courses);
        for title in &stats.course_titles {
            match index.course(title).await {
                Some(course) => {
                    let instructor = course
                        .instructor
                        .map(|i| format!(" ({})", i))
                        .unwrap_or_default();
                    println!("  - {}{}: {} lessons", title, instructor, course.lessons.len());
                }
                None => println!("  - {}", title),
            }
        }

        println!("{} chunks indexed", index.chunk_count().await);
        Ok(())
    }
}
