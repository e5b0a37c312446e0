use super::support::*;
use crate::rag::{Source, Turn};
use futures::future::join_all;
use crate::index::EmbeddingIndex;
use crate::ingest;
use lectern_core::config::{LlmSection, ProviderConfig};
use lectern_core::{AppConfig, AppError};
use lectern_llm::{Role, ToolChoice};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use crate::rag::RagSystem;

fn lesson_zero_source() -> Source {
    Source {
        text: "Intro to X - Lesson 0".to_string(),
        link: Some("https://example.com/x/0".to_string()),
    }
}

#[tokio::test]
async fn course_question_cites_the_lesson() {
    let client = ScriptedClient::new(vec![
        tool_call(json!({
            "query": "what is X",
            "course_name": "Intro to X",
            "lesson_number": 0
        })),
        text("X is a toolkit for building widgets."),
    ]);
    let system = system_with(client.clone()).await;

    let response = system.handle_query("What is X?", None).await.unwrap();

    assert_eq!(response.answer, "X is a toolkit for building widgets.");
    assert_eq!(response.sources, vec![lesson_zero_source()]);
    assert!(response.session_id.starts_with("session_"));

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
    assert_eq!(requests[0].tools[0].name(), "search_course_content");
    assert_eq!(requests[1].tool_choice, ToolChoice::None);

    let tool_message = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(tool_message.content.starts_with("[Intro to X - Lesson 0] X is a toolkit"));
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_0"));
}

#[tokio::test]
async fn unknown_course_reaches_the_model_as_a_message() {
    let client = ScriptedClient::new(vec![
        tool_call(json!({"query": "anything", "course_name": "CourseZZZ"})),
        text("I could not find that course."),
    ]);
    let system = system_with(client.clone()).await;

    let response = system.handle_query("Tell me about CourseZZZ", None).await.unwrap();

    assert!(response.sources.is_empty());
    let requests = client.requests();
    let tool_message = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(tool_message.content, "No course found matching 'CourseZZZ'.");
}

#[tokio::test]
async fn general_question_answers_without_tools() {
    let client = ScriptedClient::new(vec![text("Paris.")]);
    let system = system_with(client.clone()).await;

    let response = system
        .handle_query("What is the capital of France?", None)
        .await
        .unwrap();

    assert_eq!(response.answer, "Paris.");
    assert!(response.sources.is_empty());
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn follow_up_sees_previous_exchange() {
    let client = ScriptedClient::new(vec![text("first answer"), text("second answer")]);
    let system = system_with(client.clone()).await;

    let first = system.handle_query("first question", None).await.unwrap();
    let id = first.session_id.clone();
    assert_eq!(system.sessions().get_history(&id).await.len(), 2);

    let second = system.handle_query("second question", Some(&id)).await.unwrap();
    assert_eq!(second.session_id, id);
    assert_eq!(
        system.sessions().get_history(&id).await,
        vec![
            Turn::user("first question"),
            Turn::assistant("first answer"),
            Turn::user("second question"),
            Turn::assistant("second answer"),
        ]
    );

    let messages = &client.requests()[1].messages;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "first question");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "first answer");
    assert_eq!(messages[2].content, "second question");
}

#[tokio::test]
async fn transport_failure_leaves_history_untouched() {
    let client = ScriptedClient::new(vec![Err(AppError::Llm("connection refused".to_string()))]);
    let system = system_with(client).await;
    let id = system.sessions().create().await;

    let err = system.handle_query("What is X?", Some(&id)).await.unwrap_err();

    assert!(matches!(err, AppError::Generation(_)));
    assert!(err.to_string().contains("connection refused"));
    assert!(system.sessions().get_history(&id).await.is_empty());
}

#[tokio::test]
async fn repeated_tool_requests_are_cut_after_one_round() {
    let client = ScriptedClient::new(vec![
        tool_call(json!({"query": "widgets"})),
        tool_call(json!({"query": "more widgets"})),
        text("Final answer."),
    ]);
    let system = system_with(client.clone()).await;

    let response = system.handle_query("Explain widgets", None).await.unwrap();
    assert_eq!(response.answer, "Final answer.");

    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].tool_choice, ToolChoice::None);
    assert_eq!(requests[2].tool_choice, ToolChoice::None);
    assert!(!requests[2].tools_enabled());

    // Only the first round's calls were executed
    let tool_messages = requests[2]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .count();
    assert_eq!(tool_messages, 1);
    let last = requests[2].messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.contains("Answer the question now"));
}

#[tokio::test]
async fn model_that_never_answers_fails_the_query() {
    let client = ScriptedClient::new(vec![
        tool_call(json!({"query": "widgets"})),
        tool_call(json!({"query": "widgets"})),
        tool_call(json!({"query": "widgets"})),
    ]);
    let system = system_with(client.clone()).await;
    let id = system.sessions().create().await;

    let err = system.handle_query("Explain widgets", Some(&id)).await.unwrap_err();

    assert!(matches!(err, AppError::Generation(_)));
    assert_eq!(client.requests().len(), 3);
    assert!(system.sessions().get_history(&id).await.is_empty());
}

#[tokio::test]
async fn multiple_calls_concatenate_sources_in_order() {
    let client = ScriptedClient::new(vec![
        tool_calls(vec![
            json!({"query": "toolkit", "course_name": "Intro to X", "lesson_number": 0}),
            json!({"query": "layout", "course_name": "Intro to X", "lesson_number": 1}),
        ]),
        text("Both lessons."),
    ]);
    let system = system_with(client.clone()).await;

    let response = system.handle_query("Summarize X", None).await.unwrap();

    assert_eq!(
        response.sources,
        vec![
            lesson_zero_source(),
            Source {
                text: "Intro to X - Lesson 1".to_string(),
                link: Some("https://example.com/x".to_string()),
            },
        ]
    );

    let tool_ids: Vec<_> = client.requests()[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.clone())
        .collect();
    assert_eq!(tool_ids, vec!["call_0".to_string(), "call_1".to_string()]);
}

#[tokio::test]
async fn sources_belong_to_their_own_query() {
    let client = ScriptedClient::new(vec![
        tool_call(json!({"query": "toolkit", "course_name": "Intro", "lesson_number": 0})),
        text("X is a toolkit."),
        text("You're welcome."),
    ]);
    let system = system_with(client).await;

    let first = system.handle_query("What is X?", None).await.unwrap();
    assert_eq!(first.sources.len(), 1);

    let second = system
        .handle_query("Thanks!", Some(&first.session_id))
        .await
        .unwrap();
    assert!(second.sources.is_empty());
}

#[tokio::test]
async fn concurrent_sessions_do_not_interfere() {
    let system = Arc::new(system_with(Arc::new(EchoClient)).await);

    let queries: Vec<String> = (0..8).map(|i| format!("question {}", i)).collect();
    let results = join_all(queries.iter().map(|q| {
        let system = system.clone();
        async move { system.handle_query(q, None).await }
    }))
    .await;

    let mut ids = Vec::new();
    for (query, result) in queries.iter().zip(results) {
        let response = result.unwrap();
        assert_eq!(response.answer, format!("echo: {}", query));

        let history = system.sessions().get_history(&response.session_id).await;
        assert_eq!(history, vec![Turn::user(query.as_str()), Turn::assistant(response.answer)]);
        ids.push(response.session_id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn queries_in_one_session_run_in_turn() {
    let client = ScriptedClient::new(vec![text("first answer"), text("second answer")]);
    let system = system_with(client.clone()).await;
    let id = system.sessions().create().await;

    let (first, second) = futures::future::join(
        system.handle_query("first question", Some(&id)),
        system.handle_query("second question", Some(&id)),
    )
    .await;
    assert_eq!(first.unwrap().answer, "first answer");
    assert_eq!(second.unwrap().answer, "second answer");

    let requests = client.requests();
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[1].messages[1].content, "first answer");
    assert_eq!(system.sessions().get_history(&id).await.len(), 4);
}

#[tokio::test]
async fn session_history_stays_bounded() {
    let system = system_with(Arc::new(EchoClient)).await;
    let id = system.sessions().create().await;

    for i in 0..5 {
        system
            .handle_query(&format!("q{}", i), Some(&id))
            .await
            .unwrap();
    }

    let history = system.sessions().get_history(&id).await;
    assert_eq!(history.len(), 4);
    assert_eq!(history[0], Turn::user("q3"));
    assert_eq!(history[3], Turn::assistant("echo: q4"));
}

#[tokio::test]
async fn blank_session_id_starts_a_new_session() {
    let system = system_with(Arc::new(EchoClient)).await;

    let response = system.handle_query("hello", Some("  ")).await.unwrap();
    assert!(response.session_id.starts_with("session_"));
    assert_eq!(system.sessions().session_count().await, 1);

    assert!(system.handle_query("   ", None).await.is_err());
}

#[tokio::test]
async fn course_stats_list_titles() {
    let system = system_with(Arc::new(EchoClient)).await;
    let stats = system.get_course_stats().await;

    assert_eq!(stats.total_courses, 2);
    assert_eq!(
        stats.course_titles,
        vec!["Intro to X".to_string(), "Practical Gardening".to_string()]
    );
}

#[tokio::test]
async fn folder_ingestion_reports_skips_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("intro.txt"), INTRO_TO_X).unwrap();
    std::fs::write(dir.path().join("garden.md"), GARDENING).unwrap();
    std::fs::write(dir.path().join("slides.pdf"), b"%PDF").unwrap();
    std::fs::write(dir.path().join("broken.txt"), "Lesson 1: No header\nBody.").unwrap();
    std::fs::create_dir(dir.path().join(".cache")).unwrap();
    std::fs::write(dir.path().join(".cache").join("old.txt"), INTRO_TO_X).unwrap();

    let index = index_with_courses(&[]).await;
    let system = RagSystem::new(index, Arc::new(EchoClient), "m", "prompt", 2).unwrap();

    let report = system.add_course_folder(dir.path(), false).await.unwrap();
    assert_eq!(report.courses_added, 2);
    assert!(report.chunks_added >= 3);
    assert_eq!(report.skipped.len(), 2);
    assert!(report
        .skipped
        .iter()
        .any(|s| s.path.ends_with("slides.pdf") && s.reason == "unsupported file type"));
    assert!(report
        .skipped
        .iter()
        .any(|s| s.path.ends_with("broken.txt") && s.reason.contains("Course Title")));

    let chunk_count = system.index().chunk_count().await;

    let again = system.add_course_folder(dir.path(), false).await.unwrap();
    assert_eq!(again.courses_added, 0);
    assert_eq!(again.unchanged.len(), 2);
    assert_eq!(system.index().chunk_count().await, chunk_count);

    let cleared = system.add_course_folder(dir.path(), true).await.unwrap();
    assert_eq!(cleared.courses_added, 2);
    assert_eq!(system.index().chunk_count().await, chunk_count);
}

#[tokio::test]
async fn missing_folder_is_an_ingestion_error() {
    let system = system_with(Arc::new(EchoClient)).await;
    let err = system
        .add_course_folder(std::path::Path::new("/definitely/not/here"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Ingestion(_)));
}

#[tokio::test]
async fn catalog_survives_restart_from_config() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("intro.txt"), INTRO_TO_X).unwrap();

    let config = AppConfig {
        workspace: dir.path().to_path_buf(),
        ..Default::default()
    };

    {
        let system = RagSystem::from_config(&config).await.unwrap();
        let report = system.add_course_folder(&config.docs_dir(), false).await.unwrap();
        assert_eq!(report.courses_added, 1);
    }

    assert!(config.index_path().exists());

    let system = RagSystem::from_config(&config).await.unwrap();
    let stats = system.get_course_stats().await;
    assert_eq!(stats.course_titles, vec!["Intro to X".to_string()]);

    let report = system
        .add_course_document(&docs.join("intro.txt"))
        .await
        .unwrap();
    assert_eq!(report.courses_added, 0);
    assert_eq!(report.unchanged, vec!["Intro to X".to_string()]);
}

#[tokio::test]
async fn catalog_opens_without_model_credentials() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("intro.txt"), INTRO_TO_X).unwrap();

    let mut providers = std::collections::HashMap::new();
    providers.insert(
        "gemini".to_string(),
        ProviderConfig::Gemini {
            api_key_env: "LECTERN_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            model: "gemini-2.5-flash".to_string(),
            endpoint: None,
            timeout: None,
        },
    );
    let config = AppConfig {
        workspace: dir.path().to_path_buf(),
        provider: "gemini".to_string(),
        model: "gemini-2.5-flash".to_string(),
        llm: Some(LlmSection {
            active_provider: "gemini".to_string(),
            providers,
        }),
        ..Default::default()
    };

    assert!(matches!(
        RagSystem::from_config(&config).await,
        Err(AppError::Config(_))
    ));

    let index = EmbeddingIndex::from_config(&config).await.unwrap();
    let report = ingest::ingest_folder(&index, &config.docs_dir(), false)
        .await
        .unwrap();
    assert_eq!(report.courses_added, 1);

    let stats = index.stats().await;
    assert_eq!(stats.course_titles, vec!["Intro to X".to_string()]);
}
