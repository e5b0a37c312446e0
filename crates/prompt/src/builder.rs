//! Prompt builder for rendering system prompt templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use lectern_core::{AppError, AppResult};
use std::collections::HashMap;

/// Render a system prompt from a definition and template variables.
///
/// `tone` and `style` are taken from the definition's behavior unless the
/// caller supplies them.
///
/// # Example
/// ```no_run
/// use lectern_prompt::{build_system_prompt, default_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("tool_name".to_string(), "search_course_content".to_string());
///
/// let built = build_system_prompt(&default_prompt(), vars)?;
/// println!("{}", built.system);
/// # Ok(())
/// # }
/// ```
pub fn build_system_prompt(
    definition: &PromptDefinition,
    mut variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    variables
        .entry("tone".to_string())
        .or_insert_with(|| definition.behavior.tone.clone());
    variables
        .entry("style".to_string())
        .or_insert_with(|| definition.behavior.style.clone());

    let system = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            resolved_variables: variables,
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::default_prompt;

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("tool_name".to_string(), "search".to_string());

        let rendered = render_template("Use {{tool_name}} & co", &vars).unwrap();
        assert_eq!(rendered, "Use search & co");
    }

    #[test]
    fn test_default_prompt_mentions_tool_and_behavior() {
        let mut vars = HashMap::new();
        vars.insert(
            "tool_name".to_string(),
            "search_course_content".to_string(),
        );

        let built = build_system_prompt(&default_prompt(), vars).unwrap();
        assert!(built.system.contains("`search_course_content`"));
        assert!(built.system.contains("educational tone"));
        assert!(built.system.contains("concise style"));
        assert!(!built.system.contains("{{"));
        assert_eq!(built.metadata.source_prompt_id, "course.assistant");
    }

    #[test]
    fn test_caller_variables_override_behavior() {
        let mut vars = HashMap::new();
        vars.insert("tone".to_string(), "playful".to_string());

        let built = build_system_prompt(&default_prompt(), vars).unwrap();
        assert!(built.system.contains("playful tone"));
    }

    #[test]
    fn test_malformed_template_is_prompt_error() {
        let result = render_template("{{#if}}", &HashMap::new());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }
}
