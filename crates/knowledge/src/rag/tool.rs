//! Tools the generator can offer to the model.

use crate::index::EmbeddingIndex;
use crate::rag::types::Source;
use crate::types::{SearchHit, SearchOutcome};
use async_trait::async_trait;
use lectern_core::{AppError, AppResult};
use lectern_llm::{ParamKind, ToolDefinition, ToolParameter};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const SEARCH_TOOL_NAME: &str = "search_course_content";

/// Result of one tool invocation. Failures are reported in `content` so the
/// model can read them; they never abort the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    async fn execute(&self, arguments: &Value) -> ToolOutput;
}

/// Tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `AppError::Config` if a tool with the same name exists.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> AppResult<()> {
        let name = tool.definition().name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AppError::Config(format!(
                "Tool '{}' is already registered",
                name
            )));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition().clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, arguments: &Value) -> ToolOutput {
        match self.tools.get(name) {
            Some(tool) => tool.execute(arguments).await,
            None => {
                tracing::warn!(tool = name, "Model requested an unknown tool");
                ToolOutput::message(format!("Tool '{}' not found", name))
            }
        }
    }
}

/// Semantic search over the course index with optional course and lesson
/// filters.
pub struct CourseSearchTool {
    index: Arc<EmbeddingIndex>,
    definition: ToolDefinition,
}

#[derive(Debug, PartialEq)]
struct SearchArgs {
    query: String,
    course_name: Option<String>,
    lesson_number: Option<u32>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<EmbeddingIndex>) -> AppResult<Self> {
        let definition = ToolDefinition::new(
            SEARCH_TOOL_NAME,
            "Search course materials with smart course name matching and lesson filtering",
            vec![
                ToolParameter::required(
                    "query",
                    ParamKind::String,
                    "What to search for in the course content",
                ),
                ToolParameter::optional(
                    "course_name",
                    ParamKind::String,
                    "Course title (partial matches work, e.g. 'MCP', 'Introduction')",
                ),
                ToolParameter::optional(
                    "lesson_number",
                    ParamKind::Integer,
                    "Specific lesson number to search within (e.g. 1, 2, 3)",
                ),
            ],
        )?;

        Ok(Self { index, definition })
    }

    async fn search(&self, args: SearchArgs) -> ToolOutput {
        let outcome = self
            .index
            .search(
                &args.query,
                None,
                args.course_name.as_deref(),
                args.lesson_number,
            )
            .await;

        match outcome {
            Ok(SearchOutcome::Hits(hits)) if hits.is_empty() => {
                let mut message = format!("No relevant content found for '{}'", args.query);
                if let Some(course) = &args.course_name {
                    message.push_str(&format!(" in course '{}'", course));
                }
                if let Some(lesson) = args.lesson_number {
                    message.push_str(&format!(" in lesson {}", lesson));
                }
                message.push('.');
                ToolOutput::message(message)
            }
            Ok(SearchOutcome::Hits(hits)) => self.format_hits(&hits).await,
            Ok(SearchOutcome::NoMatchingCourse(name)) => {
                ToolOutput::message(format!("No course found matching '{}'.", name))
            }
            Err(e) => {
                tracing::warn!("Search tool failed: {}", e);
                ToolOutput::message(format!("Search failed: {}", e))
            }
        }
    }

    async fn format_hits(&self, hits: &[SearchHit]) -> ToolOutput {
        let mut blocks = Vec::with_capacity(hits.len());
        let mut sources = Vec::with_capacity(hits.len());

        for hit in hits {
            let chunk = &hit.chunk;
            let label = match chunk.lesson_number {
                Some(n) => format!("{} - Lesson {}", chunk.course_title, n),
                None => chunk.course_title.clone(),
            };
            let link = self
                .index
                .course(&chunk.course_title)
                .await
                .and_then(|course| course.citation_link(chunk.lesson_number));

            blocks.push(format!("[{}] {}", label, chunk.text));
            sources.push(Source { text: label, link });
        }

        ToolOutput {
            content: blocks.join("\n\n"),
            sources,
        }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, arguments: &Value) -> ToolOutput {
        match parse_search_args(arguments) {
            Ok(args) => self.search(args).await,
            Err(e) => ToolOutput::message(format!(
                "Invalid arguments for {}: {}",
                SEARCH_TOOL_NAME, e
            )),
        }
    }
}

fn parse_search_args(arguments: &Value) -> Result<SearchArgs, String> {
    let object = arguments
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;

    let query = object
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| "missing required string 'query'".to_string())?
        .to_string();

    let course_name = match object.get("course_name") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => return Err(format!("'course_name' must be a string, got {}", other)),
    };

    let lesson_number = match object.get("lesson_number") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            lesson_number_from(value)
                .ok_or_else(|| format!("'lesson_number' must be a non-negative integer, got {}", value))?,
        ),
    };

    Ok(SearchArgs {
        query,
        course_name,
        lesson_number,
    })
}

/// Models sometimes send integers as floats or strings.
fn lesson_number_from(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}
