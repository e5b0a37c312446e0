//! Prompt loader for the built-in and YAML prompt definitions.

use crate::types::{PromptBehavior, PromptDefinition};
use lectern_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Identifier of the built-in course assistant prompt.
pub const DEFAULT_PROMPT_ID: &str = "course.assistant";

const DEFAULT_TEMPLATE: &str = "\
You are an AI assistant specialized in course materials and educational content. \
You have access to the `{{tool_name}}` tool for searching course content.

Search tool usage:
- Use the search tool only for questions about specific course content or detailed educational materials
- Make at most one round of searches per query
- Synthesize search results into accurate, fact-based responses
- If the search yields no results, state this clearly without offering alternatives

Response protocol:
- General knowledge questions: answer from existing knowledge without searching
- Course-specific questions: search first, then answer
- No meta-commentary: do not describe the search process or mention \"based on the search results\"

All responses must be:
1. Brief and focused on the question
2. Educational, maintaining instructional value
3. Clear, using accessible language
4. Supported by examples when they aid understanding

Keep a {{tone}} tone and a {{style}} style.";

/// The built-in course assistant prompt.
pub fn default_prompt() -> PromptDefinition {
    PromptDefinition {
        id: DEFAULT_PROMPT_ID.to_string(),
        title: "Course Assistant".to_string(),
        api_version: "1.0".to_string(),
        behavior: PromptBehavior::default(),
        template: DEFAULT_TEMPLATE.to_string(),
    }
}

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".lectern/prompts")
}

/// Load a prompt definition by ID from the workspace.
///
/// This function reads `<id>.yml` from the `.lectern/prompts/` directory.
///
/// # Example
/// ```no_run
/// use lectern_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "course.assistant")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load a workspace override when present, otherwise the built-in default.
///
/// A present but invalid override is an error rather than a silent fallback.
pub fn load_or_default(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));
    if prompt_file.exists() {
        return load_prompt(workspace_path, prompt_id);
    }

    if prompt_id == DEFAULT_PROMPT_ID {
        tracing::debug!("Using built-in prompt: {}", DEFAULT_PROMPT_ID);
        Ok(default_prompt())
    } else {
        Err(AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
    }
}

/// List all prompt IDs overridden in the workspace.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
