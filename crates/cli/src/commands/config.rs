//! Config command handler.

use clap::Args;
use lectern_core::{config::AppConfig, AppResult};

/// Show the effective configuration
#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// Print the API key in full
    #[arg(long)]
    pub show_secrets: bool,
}

impl ConfigCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        println!("{}", config.summary(!self.show_secrets));

        let prompts = lectern_prompt::list_prompts(&config.workspace)?;
        if prompts.is_empty() {
            println!("Prompt: built-in {}", lectern_prompt::DEFAULT_PROMPT_ID);
        } else {
            println!("Prompt overrides: {}", prompts.join(", "));
        }

        if let Err(e) = config.validate() {
            println!();
            println!("Warning: {}", e);
        }

        Ok(())
    }
}
