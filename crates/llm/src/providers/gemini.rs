//! Google Gemini provider implementation.
//!
//! Uses the `generateContent` REST endpoint with function declarations.
//! Gemini API: https://ai.google.dev/api/generate-content

use crate::client::{
    ChatMessage, Completion, LlmClient, LlmRequest, LlmResponse, LlmUsage, Role, ToolCall,
    ToolChoice,
};
use crate::tools::{ParamKind, ToolDefinition};
use lectern_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini LLM client.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client against the public Gemini endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_options(
            "https://generativelanguage.googleapis.com",
            api_key,
            Duration::from_secs(120),
        )
    }

    /// Create a client with a custom base URL and request timeout.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn text_part(text: &str) -> GeminiPart {
        GeminiPart {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn to_content(message: &ChatMessage) -> GeminiContent {
        match message.role {
            Role::Assistant if !message.tool_calls.is_empty() => GeminiContent {
                role: Some("model".to_string()),
                parts: message
                    .tool_calls
                    .iter()
                    .map(|call| GeminiPart {
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        }),
                        ..Default::default()
                    })
                    .collect(),
            },
            Role::Assistant => GeminiContent {
                role: Some("model".to_string()),
                parts: vec![Self::text_part(&message.content)],
            },
            Role::Tool => GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    function_response: Some(FunctionResponse {
                        name: message.tool_name.clone().unwrap_or_default(),
                        response: json!({ "content": message.content }),
                    }),
                    ..Default::default()
                }],
            },
            Role::System | Role::User => GeminiContent {
                role: Some("user".to_string()),
                parts: vec![Self::text_part(&message.content)],
            },
        }
    }

    /// Gemini expects the OpenAPI subset with upper-case type names.
    fn function_declaration(tool: &ToolDefinition) -> Value {
        let mut properties = Map::new();
        for param in tool.parameters() {
            let kind = match param.kind {
                ParamKind::String => "STRING",
                ParamKind::Integer => "INTEGER",
            };
            properties.insert(
                param.name.clone(),
                json!({ "type": kind, "description": param.description }),
            );
        }
        let required: Vec<&str> = tool
            .parameters()
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "name": tool.name(),
            "description": tool.description(),
            "parameters": {
                "type": "OBJECT",
                "properties": properties,
                "required": required,
            }
        })
    }

    fn to_gemini_request(&self, request: &LlmRequest) -> GeminiRequest {
        // Consecutive messages with the same role are merged; function
        // responses for one round must share a single content block.
        let mut contents: Vec<GeminiContent> = Vec::new();
        for message in &request.messages {
            let content = Self::to_content(message);
            match contents.last_mut() {
                Some(last) if last.role == content.role => last.parts.extend(content.parts),
                _ => contents.push(content),
            }
        }

        let (tools, tool_config) = if request.tools.is_empty() {
            (Vec::new(), None)
        } else {
            let declarations: Vec<Value> =
                request.tools.iter().map(Self::function_declaration).collect();
            let mode = match request.tool_choice {
                ToolChoice::Auto => "AUTO",
                ToolChoice::None => "NONE",
            };
            (
                vec![json!({ "functionDeclarations": declarations })],
                Some(json!({ "functionCallingConfig": { "mode": mode } })),
            )
        };

        let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        GeminiRequest {
            contents,
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: None,
                parts: vec![Self::text_part(s)],
            }),
            tools,
            tool_config,
            generation_config,
        }
    }

    fn convert_response(&self, response: GeminiResponse, model: &str) -> AppResult<LlmResponse> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("Gemini returned no candidates".to_string()))?;

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.is_empty() {
            return Err(AppError::Llm(format!(
                "Gemini returned an empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    id: format!("call_{}", tool_calls.len()),
                    name: call.name,
                    arguments: call.args,
                });
            }
        }

        let usage = response
            .usage_metadata
            .map(|u| LlmUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(LlmResponse {
            completion: Completion::from_parts(text, tool_calls),
            model: response.model_version.unwrap_or_else(|| model.to_string()),
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, tools = request.tools_enabled(), "Sending generateContent request to Gemini");

        let body = self.to_gemini_request(request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Gemini: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Gemini response: {}", e)))?;

        tracing::info!("Received completion from Gemini");
        self.convert_response(parsed, &request.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolParameter;

    fn tool() -> ToolDefinition {
        ToolDefinition::new(
            "search_course_content",
            "Search course materials",
            vec![
                ToolParameter::required("query", ParamKind::String, "q"),
                ToolParameter::optional("lesson_number", ParamKind::Integer, "n"),
            ],
        )
        .unwrap()
    }

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "search_course_content".to_string(),
            arguments: json!({"query": "x"}),
        }
    }

    #[test]
    fn test_request_has_system_instruction_and_declarations() {
        let client = GeminiClient::new("key");
        let request = LlmRequest::new("gemini-2.5-flash")
            .with_system("be brief")
            .with_messages(vec![ChatMessage::user("hi")])
            .with_tools(vec![tool()]);

        let body = serde_json::to_value(client.to_gemini_request(&request)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        let decl = &body["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["name"], "search_course_content");
        assert_eq!(decl["parameters"]["properties"]["lesson_number"]["type"], "INTEGER");
        assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
    }

    #[test]
    fn test_text_only_request_sets_mode_none() {
        let client = GeminiClient::new("key");
        let request = LlmRequest::new("gemini-2.5-flash")
            .with_messages(vec![ChatMessage::user("hi")])
            .with_tools(vec![tool()])
            .with_tool_choice(ToolChoice::None);

        let body = serde_json::to_value(client.to_gemini_request(&request)).unwrap();
        assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "NONE");
    }

    #[test]
    fn test_function_responses_share_one_content() {
        let client = GeminiClient::new("key");
        let (a, b) = (call("call_0"), call("call_1"));
        let request = LlmRequest::new("gemini-2.5-flash").with_messages(vec![
            ChatMessage::user("q"),
            ChatMessage::assistant_tool_calls(vec![a.clone(), b.clone()]),
            ChatMessage::tool_result(&a, "first"),
            ChatMessage::tool_result(&b, "second"),
        ]);

        let converted = client.to_gemini_request(&request);
        assert_eq!(converted.contents.len(), 3);
        assert_eq!(converted.contents[1].role.as_deref(), Some("model"));
        assert_eq!(converted.contents[1].parts.len(), 2);
        assert_eq!(converted.contents[2].parts.len(), 2);
        let response = converted.contents[2].parts[1].function_response.as_ref().unwrap();
        assert_eq!(response.response["content"], "second");
    }

    #[test]
    fn test_function_call_response_parsing() {
        let client = GeminiClient::new("key");
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "search_course_content", "args": {"query": "rust"}}}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 20, "candidatesTokenCount": 4}
        });

        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let response = client.convert_response(parsed, "gemini-2.5-flash").unwrap();
        match response.completion {
            Completion::ToolCallRequest(calls) => {
                assert_eq!(calls[0].name, "search_course_content");
                assert_eq!(calls[0].arguments["query"], "rust");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
        assert_eq!(response.model, "gemini-2.5-flash");
        assert_eq!(response.usage.total_tokens, 24);
    }

    #[test]
    fn test_no_candidates_is_error() {
        let client = GeminiClient::new("key");
        let parsed: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(
            client.convert_response(parsed, "m"),
            Err(AppError::Llm(_))
        ));
    }
}
