//! Ask command handler.
//!
//! Answers a single question against the indexed courses.

use clap::Args;
use lectern_core::{config::AppConfig, AppResult};
use lectern_knowledge::RagSystem;

/// Ask one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Continue an existing session. Sessions live only as long as the
    /// process, so this is mostly useful from `chat`.
    #[arg(short, long)]
    pub session: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let system = RagSystem::from_config(config).await?;
        let stats = system.get_course_stats().await;
        if stats.total_courses == 0 {
            tracing::warn!("No courses indexed; run 'lectern ingest' first");
        }

        let response = system
            .handle_query(&self.query, self.session.as_deref())
            .await?;

        if self.json {
            super::print_json(&response)?;
        } else {
            println!("{}", response.answer);
            super::print_sources(&response.sources);
        }

        Ok(())
    }
}
