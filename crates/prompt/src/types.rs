//! Prompt types for Lectern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A system prompt definition, built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Behavioral settings
    #[serde(default)]
    pub behavior: PromptBehavior,

    /// Template string with Handlebars syntax
    pub template: String,
}

/// Behavioral settings exposed to the template as `tone` and `style`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBehavior {
    /// Tone (e.g., "educational", "casual", "technical")
    pub tone: String,

    /// Style (e.g., "concise", "detailed")
    pub style: String,
}

impl Default for PromptBehavior {
    fn default() -> Self {
        Self {
            tone: "educational".to_string(),
            style: "concise".to_string(),
        }
    }
}

/// A rendered system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub system: String,

    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: course.assistant
title: Course Assistant
apiVersion: "1.0"
behavior:
  tone: friendly
  style: detailed
template: "You answer questions with {{tool_name}}."
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "course.assistant");
        assert_eq!(def.behavior.tone, "friendly");
        assert_eq!(def.behavior.style, "detailed");
    }

    #[test]
    fn test_behavior_defaults_when_omitted() {
        let yaml = r#"
id: minimal
title: Minimal
apiVersion: "1.0"
template: "Hi"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.behavior.tone, "educational");
        assert_eq!(def.behavior.style, "concise");
    }
}
