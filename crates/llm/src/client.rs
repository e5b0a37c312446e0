//! LLM client abstraction and request/response types.
//!
//! This module defines the chat protocol shared by every provider: a request
//! carries a system instruction, prior messages and the tools the model may
//! call; a response is either a final text answer or a batch of tool calls.

use lectern_core::AppResult;
use serde::{Deserialize, Serialize};

use crate::tools::ToolDefinition;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned (or synthesized) call identifier
    pub id: String,

    /// Name of the tool to run
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// One message of a conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,

    #[serde(default)]
    pub content: String,

    /// Tool calls made by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Call this tool message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced this message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn that requested tool calls.
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::plain(Role::Assistant, "")
        }
    }

    /// Result of executing one tool call.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// Whether the model may call tools on this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides
    #[default]
    Auto,
    /// Text only
    None,
}

/// LLM chat completion request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g., "llama3.2", "gemini-2.5-flash")
    pub model: String,

    /// System instruction
    pub system: Option<String>,

    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessage>,

    /// Tools offered to the model
    pub tools: Vec<ToolDefinition>,

    pub tool_choice: ToolChoice,

    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Create a new request for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: Vec::new(),
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Whether tools should be offered to the model.
    pub fn tools_enabled(&self) -> bool {
        self.tool_choice == ToolChoice::Auto && !self.tools.is_empty()
    }
}

/// What the model produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Completion {
    /// Final text answer
    TextAnswer(String),

    /// One or more tool calls to execute before answering
    ToolCallRequest(Vec<ToolCall>),
}

impl Completion {
    /// Build a completion from raw provider output; tool calls win over text.
    pub fn from_parts(text: String, tool_calls: Vec<ToolCall>) -> Self {
        if tool_calls.is_empty() {
            Completion::TextAnswer(text)
        } else {
            Completion::ToolCallRequest(tool_calls)
        }
    }
}

/// LLM completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub completion: Completion,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for LLM providers.
///
/// This trait abstracts the underlying provider (Ollama, Gemini) behind a
/// single chat completion call.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "gemini").
    fn provider_name(&self) -> &str;

    /// Perform a chat completion.
    ///
    /// # Errors
    /// Returns `AppError::Llm` on transport failures, non-success status
    /// codes and unparseable responses.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParamKind, ToolParameter};
    use serde_json::json;

    #[test]
    fn test_tool_calls_take_precedence_over_text() {
        let call = ToolCall {
            id: "call_0".to_string(),
            name: "search".to_string(),
            arguments: json!({"query": "x"}),
        };
        let completion = Completion::from_parts("thinking...".to_string(), vec![call.clone()]);
        assert_eq!(completion, Completion::ToolCallRequest(vec![call]));

        let text = Completion::from_parts("answer".to_string(), vec![]);
        assert_eq!(text, Completion::TextAnswer("answer".to_string()));
    }

    #[test]
    fn test_tools_enabled_respects_choice() {
        let tool = ToolDefinition::new(
            "search",
            "Search",
            vec![ToolParameter::required("query", ParamKind::String, "q")],
        )
        .unwrap();

        let request = LlmRequest::new("m").with_tools(vec![tool]);
        assert!(request.tools_enabled());

        let request = request.with_tool_choice(ToolChoice::None);
        assert!(!request.tools_enabled());

        assert!(!LlmRequest::new("m").tools_enabled());
    }

    #[test]
    fn test_tool_result_links_call() {
        let call = ToolCall {
            id: "abc".to_string(),
            name: "search".to_string(),
            arguments: json!({}),
        };
        let msg = ChatMessage::tool_result(&call, "result");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("abc"));
        assert_eq!(msg.tool_name.as_deref(), Some("search"));
    }

    #[test]
    fn test_completion_serialization_is_tagged() {
        let value = serde_json::to_value(Completion::TextAnswer("hi".to_string())).unwrap();
        assert_eq!(value, json!({"type": "text_answer", "value": "hi"}));
    }
}
