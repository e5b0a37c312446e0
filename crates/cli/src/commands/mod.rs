//! Command handlers for the Lectern CLI.

pub mod ask;
pub mod chat;
pub mod config;
pub mod courses;
pub mod ingest;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use config::ConfigCommand;
pub use courses::CoursesCommand;
pub use ingest::IngestCommand;

use lectern_core::{AppError, AppResult};
use lectern_knowledge::Source;

/// Print the sources of an answer below it.
pub(crate) fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for source in sources {
        match &source.link {
            Some(link) => println!("  - {} <{}>", source.text, link),
            None => println!("  - {}", source.text),
        }
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub(crate) fn report_error(error: &AppError) {
    eprintln!("Error: {}", error);
    if let Some(hint) = error.hint() {
        eprintln!("Hint: {}", hint);
    }
}
