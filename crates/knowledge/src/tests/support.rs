//! Test doubles and fixtures.

use crate::config::ChunkConfig;
use crate::embeddings::TrigramProvider;
use crate::index::EmbeddingIndex;
use crate::parser::parse_course_document;
use crate::rag::RagSystem;
use lectern_core::{AppError, AppResult};
use lectern_llm::{
    Completion, LlmClient, LlmRequest, LlmResponse, LlmUsage, Role, ToolCall,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const INTRO_TO_X: &str = "\
Course Title: Intro to X
Course Link: https://example.com/x
Course Instructor: Ada Lovelace

Lesson 0: Getting Started
Lesson Link: https://example.com/x/0
X is a toolkit for building widgets. It runs on every platform.

Lesson 1: Layout
Widgets are arranged with flexible layout containers.
";

pub const GARDENING: &str = "\
Course Title: Practical Gardening
Course Link: https://example.com/garden

Lesson 1: Soil
Healthy soil needs compost and regular watering.
";

/// Replays a fixed sequence of responses and records every request.
pub struct ScriptedClient {
    script: Mutex<VecDeque<AppResult<LlmResponse>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<AppResult<LlmResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Llm("script exhausted".to_string())))
    }
}

/// Answers every request with text derived from the latest user message.
pub struct EchoClient;

#[async_trait::async_trait]
impl LlmClient for EchoClient {
    fn provider_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        tokio::task::yield_now().await;
        Ok(response(Completion::TextAnswer(format!("echo: {}", last_user))))
    }
}

fn response(completion: Completion) -> LlmResponse {
    LlmResponse {
        completion,
        model: "test-model".to_string(),
        usage: LlmUsage::new(10, 5),
    }
}

pub fn text(answer: &str) -> AppResult<LlmResponse> {
    Ok(response(Completion::TextAnswer(answer.to_string())))
}

pub fn tool_calls(arguments: Vec<Value>) -> AppResult<LlmResponse> {
    let calls = arguments
        .into_iter()
        .enumerate()
        .map(|(i, arguments)| ToolCall {
            id: format!("call_{}", i),
            name: "search_course_content".to_string(),
            arguments,
        })
        .collect();
    Ok(response(Completion::ToolCallRequest(calls)))
}

pub fn tool_call(arguments: Value) -> AppResult<LlmResponse> {
    tool_calls(vec![arguments])
}

pub async fn index_with_courses(documents: &[&str]) -> Arc<EmbeddingIndex> {
    let index = Arc::new(EmbeddingIndex::new(
        Arc::new(TrigramProvider::new(256)),
        ChunkConfig::default(),
        5,
    ));
    for document in documents {
        index
            .add_course(&parse_course_document(document).unwrap())
            .await
            .unwrap();
    }
    index
}

pub async fn system_with(client: Arc<dyn LlmClient>) -> RagSystem {
    let index = index_with_courses(&[INTRO_TO_X, GARDENING]).await;
    RagSystem::new(index, client, "test-model", "You answer course questions.", 2).unwrap()
}
