//! Interactive multi-turn chat.

use clap::Args;
use lectern_core::{config::AppConfig, AppResult};
use lectern_knowledge::RagSystem;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Start an interactive session (type `exit` to quit)
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Index the configured docs folder before starting
    #[arg(long)]
    pub ingest: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Starting chat session");

        let system = RagSystem::from_config(config).await?;

        if self.ingest {
            let report = system.add_course_folder(&config.docs_dir(), false).await?;
            println!(
                "Indexed {} new course(s), {} unchanged, {} skipped",
                report.courses_added,
                report.unchanged.len(),
                report.skipped.len()
            );
        }
        let mut session_id = system.sessions().create().await;

        let stats = system.get_course_stats().await;
        println!(
            "Lectern chat: {} course(s) loaded. Type 'exit' to quit, 'reset' to start over.",
            stats.total_courses
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match line.trim() {
                "" => continue,
                "exit" | "quit" => break,
                "reset" => {
                    system.reset_sessions().await;
                    session_id = system.sessions().create().await;
                    println!("Conversation cleared.");
                    continue;
                }
                query => match system.handle_query(query, Some(&session_id)).await {
                    Ok(response) => {
                        println!("{}", response.answer);
                        super::print_sources(&response.sources);
                        println!();
                    }
                    Err(e) => {
                        tracing::error!("Query failed: {}", e);
                        super::report_error(&e);
                    }
                },
            }
        }

        tracing::info!(session = %session_id, "Chat session ended");
        Ok(())
    }
}
