//! Tool-augmented answer generation.
//!
//! One query runs at most one tool round:
//!
//! 1. The model sees the system prompt, prior turns, the query and the tool
//!    schemas. A text answer ends the loop.
//! 2. Otherwise every requested call is executed in order and its output is
//!    appended as a tool message. The model is asked again with tools
//!    disabled.
//! 3. If it still asks for tools, those calls are dropped and one more
//!    text-only completion is forced with an explicit instruction. A third
//!    tool request fails the query.

use crate::rag::tool::ToolRegistry;
use crate::rag::types::{GeneratedAnswer, Source, Turn, TurnRole};
use lectern_core::{AppError, AppResult};
use lectern_llm::{ChatMessage, Completion, LlmClient, LlmRequest, ToolChoice};
use std::sync::Arc;

const TEMPERATURE: f32 = 0.0;
const MAX_TOKENS: u32 = 800;

const FINAL_ANSWER_INSTRUCTION: &str = "Tools are no longer available. Answer the question now \
using only the search results above and your own knowledge.";

pub struct Generator {
    client: Arc<dyn LlmClient>,
    model: String,
    system_prompt: String,
    tools: ToolRegistry,
}

impl Generator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: system_prompt.into(),
            tools,
        }
    }

    fn request(&self, messages: &[ChatMessage], choice: ToolChoice) -> LlmRequest {
        LlmRequest::new(&self.model)
            .with_system(&self.system_prompt)
            .with_messages(messages.to_vec())
            .with_tools(self.tools.definitions())
            .with_tool_choice(choice)
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS)
    }

    async fn call(&self, request: &LlmRequest) -> AppResult<Completion> {
        tracing::debug!(
            provider = self.client.provider_name(),
            messages = request.messages.len(),
            tools = request.tools_enabled(),
            "Calling model"
        );

        let response = self
            .client
            .complete(request)
            .await
            .map_err(|e| AppError::Generation(format!("LLM call failed: {}", e)))?;

        tracing::debug!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Model responded"
        );
        Ok(response.completion)
    }

    /// Answer `query` given prior turns of the conversation.
    ///
    /// # Errors
    /// Returns `AppError::Generation` if a model call fails or the model
    /// never produces a text answer.
    pub async fn generate(&self, query: &str, history: &[Turn]) -> AppResult<GeneratedAnswer> {
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| match turn.role {
                TurnRole::User => ChatMessage::user(&turn.text),
                TurnRole::Assistant => ChatMessage::assistant(&turn.text),
            })
            .collect();
        messages.push(ChatMessage::user(query));

        let calls = match self.call(&self.request(&messages, ToolChoice::Auto)).await? {
            Completion::TextAnswer(text) => {
                return Ok(GeneratedAnswer {
                    text,
                    sources: None,
                })
            }
            Completion::ToolCallRequest(calls) => calls,
        };

        tracing::info!(calls = calls.len(), "Running tool round");
        messages.push(ChatMessage::assistant_tool_calls(calls.clone()));

        let mut sources: Vec<Source> = Vec::new();
        for call in &calls {
            let output = self.tools.execute(&call.name, &call.arguments).await;
            tracing::debug!(
                tool = %call.name,
                sources = output.sources.len(),
                "Tool executed"
            );
            messages.push(ChatMessage::tool_result(call, output.content));
            sources.extend(output.sources);
        }

        if let Completion::TextAnswer(text) =
            self.call(&self.request(&messages, ToolChoice::None)).await?
        {
            return Ok(GeneratedAnswer {
                text,
                sources: Some(sources),
            });
        }

        tracing::warn!("Model requested tools after the tool round; forcing a text answer");
        messages.push(ChatMessage::user(FINAL_ANSWER_INSTRUCTION));

        match self.call(&self.request(&messages, ToolChoice::None)).await? {
            Completion::TextAnswer(text) => Ok(GeneratedAnswer {
                text,
                sources: Some(sources),
            }),
            Completion::ToolCallRequest(_) => Err(AppError::Generation(
                "model kept requesting tools after the tool round".to_string(),
            )),
        }
    }
}
