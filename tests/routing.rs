//! Integration tests for Agentix
//!
//! These drive the public API of `agentix_llm` end to end:
//! - registry + configuration -> router
//! - routing across real local-HTTP adapters (served by wiremock)
//! - shared context window carried between backends and persisted

use agentix_llm::{
    BackendAdapter, BackendConfig, BackendRegistry, BackendShape, Error, Message, MessageFormat,
    MessageRole, MockAdapter, ProviderRouter, RouteRequest, RouterConfig, SharedContextWindow,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn ollama_server(reply: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "codellama",
            "message": {"role": "assistant", "content": reply},
            "done": true
        })))
        .mount(&server)
        .await;
    server
}

async fn bridge_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

// ============================================================================
// Routing across configured backends
// ============================================================================

#[tokio::test]
async fn test_local_backends_share_one_conversation() {
    let ollama = ollama_server("draft from ollama").await;
    let bridge = bridge_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user", "content": "draft it"},
                {"role": "assistant", "content": "draft from ollama"},
                {"role": "user", "content": "refine it"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4-turbo",
            "choices": [{"message": {"role": "assistant", "content": "refined"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
        })))
        .expect(1)
        .mount(&bridge)
        .await;

    let config = RouterConfig::default()
        .with_backend("ollama", BackendConfig::enabled().with_base_url(ollama.uri()))
        .with_backend(
            "local_openai",
            BackendConfig::enabled().with_base_url(bridge.uri()),
        )
        .with_backend("claude", BackendConfig::default());

    let window = Arc::new(Mutex::new(SharedContextWindow::new(10_000)));
    let router = ProviderRouter::from_config(&config, &BackendRegistry::builtin())
        .await
        .unwrap()
        .with_shared_context(Arc::clone(&window));
    assert_eq!(router.available_backends(), vec!["ollama", "local_openai"]);

    let first = router
        .complete(
            RouteRequest::new(vec![Message::user("draft it")], "cost_effective")
                .with_shared_context(true),
        )
        .await
        .unwrap();
    assert_eq!(first.backend, "ollama");
    assert_eq!(first.content, "draft from ollama");

    let second = router
        .complete(
            RouteRequest::new(vec![Message::user("refine it")], "cost_effective")
                .prefer("local_openai")
                .with_shared_context(true),
        )
        .await
        .unwrap();
    assert_eq!(second.backend, "local_openai");
    assert_eq!(second.content, "refined");
    assert_eq!(second.usage.map(|u| u.total_tokens), Some(14));

    let window = window.lock().unwrap();
    let summary = window.summary();
    assert_eq!(summary.total_messages, 4);
    assert_eq!(summary.per_backend_counts.get("ollama"), Some(&1));
    assert_eq!(summary.per_backend_counts.get("local_openai"), Some(&1));

    let attributed = serde_json::to_value(window.messages(MessageFormat::Attributed, None)).unwrap();
    assert_eq!(attributed[1]["backend"], "ollama");
    assert_eq!(attributed[1]["model"], "codellama");
    assert_eq!(attributed[3]["backend"], "local_openai");
}

#[tokio::test]
async fn test_backend_failure_reports_backend_and_kind() {
    let bridge = bridge_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&bridge)
        .await;

    let config = RouterConfig::default().with_backend(
        "local_claude",
        BackendConfig::enabled().with_base_url(bridge.uri()),
    );
    let router = ProviderRouter::from_config(&config, &BackendRegistry::builtin())
        .await
        .unwrap();

    let err = router
        .complete(RouteRequest::new(vec![Message::user("review")], "review"))
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("local_claude"));
    assert!(msg.contains("not authenticated"));
}

#[tokio::test]
async fn test_host_registered_backend_is_routable() {
    let mut registry = BackendRegistry::builtin();
    registry.register("echo", BackendShape::LocalHttp, "always available", |_| {
        Ok(Arc::new(MockAdapter::new("echo").with_reply("pong")))
    });
    let config = RouterConfig::default().with_backend("echo", BackendConfig::enabled());

    let router = ProviderRouter::from_config(&config, &registry).await.unwrap();
    let routed = router
        .complete(RouteRequest::new(vec![Message::user("ping")], "anything at all"))
        .await
        .unwrap();

    assert_eq!(routed.backend, "echo");
    assert_eq!(routed.content, "pong");
    assert_eq!(router.backend_info("echo").unwrap().shape, BackendShape::LocalHttp);
}

#[tokio::test]
async fn test_no_usable_backend_lists_remediation_per_family() {
    let config = RouterConfig::default()
        .with_backend(
            "claude_cli",
            BackendConfig::enabled().with_command("/nonexistent/agentix-test/claude"),
        )
        .with_backend(
            "ollama",
            BackendConfig::enabled()
                .with_base_url("http://127.0.0.1:9")
                .with_timeout_secs(2),
        );

    let err = ProviderRouter::from_config(&config, &BackendRegistry::builtin())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let msg = err.to_string();
    assert!(msg.contains("claude_cli (cli_authenticated)"));
    assert!(msg.contains("claude login"));
    assert!(msg.contains("ollama (local_http)"));
    assert!(msg.contains("ollama serve"));
    assert!(!msg.contains("ANTHROPIC_API_KEY"));
}

// ============================================================================
// Shared context persistence
// ============================================================================

#[tokio::test]
async fn test_window_survives_save_and_restore_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("agentix").join("context.json");

    let adapter = Arc::new(MockAdapter::new("smart").with_reply("use a trie"));
    let window = Arc::new(Mutex::new(SharedContextWindow::new(5_000)));
    window
        .lock()
        .unwrap()
        .add_message(MessageRole::System, "Be brief.", None, None, None);

    let router = ProviderRouter::new(vec![Arc::clone(&adapter) as Arc<dyn BackendAdapter>])
        .await
        .unwrap()
        .with_shared_context(Arc::clone(&window));
    router
        .complete(
            RouteRequest::new(vec![Message::user("how to autocomplete?")], "planning")
                .with_shared_context(true),
        )
        .await
        .unwrap();
    window.lock().unwrap().save_snapshot(&snapshot).unwrap();

    let mut restored = SharedContextWindow::default();
    restored.restore_snapshot(&snapshot).unwrap();

    let original = window.lock().unwrap();
    assert_eq!(restored.entries(), original.entries());
    assert_eq!(restored.summary(), original.summary());
    assert_eq!(restored.entries()[2].backend.as_deref(), Some("smart"));
    assert_eq!(restored.to_messages()[0], Message::system("Be brief."));
}
