//! Ollama LLM provider implementation.
//!
//! This module talks to the Ollama chat endpoint, including its native
//! function-calling support.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{
    ChatMessage, Completion, LlmClient, LlmRequest, LlmResponse, LlmUsage, Role, ToolCall,
};
use lectern_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Ollama chat response format.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client with a custom base URL and request timeout.
    pub fn with_options(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn to_ollama_message(message: &ChatMessage) -> OllamaMessage {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        OllamaMessage {
            role: role.to_string(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| OllamaToolCall {
                    id: None,
                    function: OllamaFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
            tool_name: message.tool_name.clone(),
        }
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.clone(),
                tool_calls: Vec::new(),
                tool_name: None,
            });
        }
        messages.extend(request.messages.iter().map(Self::to_ollama_message));

        // Ollama has no tool_choice; a text-only request simply omits tools.
        let tools = if request.tools_enabled() {
            request
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.name(),
                            "description": tool.description(),
                            "parameters": tool.to_json_schema(),
                        }
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: request.model.clone(),
            messages,
            tools,
            stream: false,
            options,
        }
    }

    /// Convert Ollama response to LlmResponse.
    fn convert_response(&self, response: OllamaChatResponse) -> LlmResponse {
        let usage = LlmUsage::new(
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        );

        let tool_calls = response
            .message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| ToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{}", i)),
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        LlmResponse {
            completion: Completion::from_parts(response.message.content, tool_calls),
            model: response.model,
            usage,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, tools = request.tools_enabled(), "Sending chat request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let ollama_request = self.to_ollama_request(request);
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::info!("Received completion from Ollama");
        tracing::debug!("Response: {:?}", ollama_response);

        Ok(self.convert_response(ollama_response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ToolChoice;
    use crate::tools::{ParamKind, ToolDefinition, ToolParameter};
    use serde_json::json;

    fn tool() -> ToolDefinition {
        ToolDefinition::new(
            "search_course_content",
            "Search course materials",
            vec![ToolParameter::required("query", ParamKind::String, "q")],
        )
        .unwrap()
    }

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_request_conversion_with_tools() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("llama3.2")
            .with_system("be brief")
            .with_messages(vec![ChatMessage::user("Hello")])
            .with_tools(vec![tool()])
            .with_temperature(0.0)
            .with_max_tokens(100);

        let converted = client.to_ollama_request(&request);
        assert_eq!(converted.model, "llama3.2");
        assert_eq!(converted.messages.len(), 2);
        assert_eq!(converted.messages[0].role, "system");
        assert_eq!(converted.messages[1].content, "Hello");
        assert_eq!(converted.tools.len(), 1);
        assert_eq!(converted.tools[0]["function"]["name"], "search_course_content");
        assert!(!converted.stream);

        let options = converted.options.unwrap();
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.num_predict, Some(100));
    }

    #[test]
    fn test_text_only_request_omits_tools() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("llama3.2")
            .with_tools(vec![tool()])
            .with_tool_choice(ToolChoice::None);

        let body = serde_json::to_value(client.to_ollama_request(&request)).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_tool_call_response_conversion() {
        let client = OllamaClient::new();
        let raw = json!({
            "model": "llama3.2",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "search_course_content", "arguments": {"query": "rust"}}}
                ]
            },
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 3
        });

        let parsed: OllamaChatResponse = serde_json::from_value(raw).unwrap();
        let response = client.convert_response(parsed);

        match response.completion {
            Completion::ToolCallRequest(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_0");
                assert_eq!(calls[0].arguments["query"], "rust");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_tool_result_message_conversion() {
        let call = ToolCall {
            id: "call_0".to_string(),
            name: "search_course_content".to_string(),
            arguments: json!({"query": "rust"}),
        };
        let msg = OllamaClient::to_ollama_message(&ChatMessage::tool_result(&call, "hits"));
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.tool_name.as_deref(), Some("search_course_content"));

        let msg = OllamaClient::to_ollama_message(&ChatMessage::assistant_tool_calls(vec![call]));
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].function.name, "search_course_content");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_llm_error() {
        let client = OllamaClient::with_options("http://127.0.0.1:9", Duration::from_secs(2));
        let request = LlmRequest::new("llama3.2").with_messages(vec![ChatMessage::user("hi")]);
        let result = client.complete(&request).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }
}
