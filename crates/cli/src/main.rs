//! Lectern CLI
//!
//! Question answering over course materials: ingest course documents, then
//! ask about them one question at a time or in a chat session.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, ConfigCommand, CoursesCommand, IngestCommand};
use lectern_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use std::process::ExitCode;

/// Lectern - ask questions about your course materials
#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(about = "Ask questions about your course materials", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "LECTERN_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "LECTERN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, gemini)
    #[arg(short, long, global = true, env = "LECTERN_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "LECTERN_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index course documents
    Ingest(IngestCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Interactive multi-turn session
    Chat(ChatCommand),

    /// List indexed courses
    Courses(CoursesCommand),

    /// Show the effective configuration
    Config(ConfigCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Ask(_) => "ask",
            Commands::Chat(_) => "chat",
            Commands::Courses(_) => "courses",
            Commands::Config(_) => "config",
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Lectern CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_lectern_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Courses(cmd) => cmd.execute(&config).await,
        Commands::Config(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::report_error(&e);
            ExitCode::FAILURE
        }
    }
}
