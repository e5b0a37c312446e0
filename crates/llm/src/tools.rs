//! Tool declarations offered to a model.
//!
//! A `ToolDefinition` is validated once at construction and then rendered
//! into whichever schema dialect a provider expects.

use lectern_core::{AppError, AppResult};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Primitive type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
}

impl ParamKind {
    /// JSON Schema type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
        }
    }
}

/// A single named parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Declaration of a callable tool: name, description and typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    /// Build a tool definition.
    ///
    /// # Errors
    /// Returns `AppError::Config` when the tool name or a parameter name is
    /// empty, or when two parameters share a name.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
    ) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Config("Tool name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for param in &parameters {
            if param.name.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Tool '{}' has a parameter with an empty name",
                    name
                )));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(AppError::Config(format!(
                    "Tool '{}' declares parameter '{}' more than once",
                    name, param.name
                )));
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            parameters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    /// Render the parameters as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.as_str(),
                    "description": param.description,
                }),
            );
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
