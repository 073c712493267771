//! Tests for router module

use super::*;
use crate::adapter::{BackendAdapter, BackendShape};
use crate::capability::{Capability, TaskType};
use crate::config::{BackendConfig, RouterConfig, RoutingConfig};
use crate::context::SharedContextWindow;
use crate::error::{BackendErrorKind, Error};
use crate::message::{Message, MessageRole};
use crate::registry::BackendRegistry;
use std::sync::{Arc, Mutex};

fn fast() -> Arc<MockAdapter> {
    Arc::new(
        MockAdapter::new("fast")
            .with_capabilities(&[Capability::CodeGeneration])
            .with_max_context_tokens(4_000),
    )
}

fn smart() -> Arc<MockAdapter> {
    Arc::new(
        MockAdapter::new("smart")
            .with_capabilities(&[Capability::Planning, Capability::CodeGeneration])
            .with_max_context_tokens(200_000)
            .with_default_model("smart-large"),
    )
}

fn adapters(mocks: &[&Arc<MockAdapter>]) -> Vec<Arc<dyn BackendAdapter>> {
    mocks
        .iter()
        .map(|m| Arc::clone(*m) as Arc<dyn BackendAdapter>)
        .collect()
}

async fn router(fast: &Arc<MockAdapter>, smart: &Arc<MockAdapter>) -> ProviderRouter {
    ProviderRouter::new(adapters(&[fast, smart]))
        .await
        .unwrap()
        .with_preferences(TaskPreferences::builtin().with_row("planning", ["smart", "fast"]))
}

fn prompt(tokens: usize) -> Vec<Message> {
    vec![Message::user("x".repeat(tokens * 4))]
}

// ============================================================================
// Construction
// ============================================================================

#[tokio::test]
async fn test_router_requires_a_valid_backend() {
    let err = ProviderRouter::new(vec![
        Arc::new(MockAdapter::new("a").invalid()) as Arc<dyn BackendAdapter>,
        Arc::new(MockAdapter::new("b").invalid()) as Arc<dyn BackendAdapter>,
    ])
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.to_string().contains("a, b"));

    assert!(ProviderRouter::new(Vec::new()).await.is_err());
}

#[tokio::test]
async fn test_invalid_backends_are_skipped() {
    let router = ProviderRouter::new(vec![
        Arc::new(MockAdapter::new("broken").invalid()) as Arc<dyn BackendAdapter>,
        Arc::new(MockAdapter::new("ok")) as Arc<dyn BackendAdapter>,
    ])
    .await
    .unwrap();
    assert_eq!(router.available_backends(), vec!["ok".to_string()]);
}

fn test_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register("alpha", BackendShape::HostedApi, "set ALPHA_API_KEY", |_| {
        Ok(Arc::new(MockAdapter::new("alpha").invalid()))
    });
    registry.register(
        "beta_cli",
        BackendShape::CliAuthenticated,
        "install beta and run `beta login`",
        |_| {
            Err(Error::BackendInit {
                backend: "beta_cli".to_string(),
                reason: "boom".to_string(),
            })
        },
    );
    registry.register("gamma", BackendShape::LocalHttp, "start gamma", |_| {
        Ok(Arc::new(MockAdapter::new("gamma")))
    });
    registry
}

#[tokio::test]
async fn test_all_enabled_backends_failing_lists_remediation() {
    let config = RouterConfig::default()
        .with_backend("alpha", BackendConfig::enabled())
        .with_backend("beta_cli", BackendConfig::enabled());

    let err = ProviderRouter::from_config(&config, &test_registry())
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(msg.contains("alpha (hosted_api): set ALPHA_API_KEY"));
    assert!(msg.contains("beta_cli (cli_authenticated): install beta and run `beta login`"));
    assert!(!msg.contains("start gamma"));
}

#[tokio::test]
async fn test_nothing_enabled_lists_every_backend() {
    let config = RouterConfig::default().with_backend("gamma", BackendConfig::default());

    let msg = ProviderRouter::from_config(&config, &test_registry())
        .await
        .unwrap_err()
        .to_string();
    assert!(msg.contains("set ALPHA_API_KEY"));
    assert!(msg.contains("beta login"));
    assert!(msg.contains("start gamma"));
}

#[tokio::test]
async fn test_from_config_keeps_working_backends() {
    let config = RouterConfig::default()
        .with_backend("alpha", BackendConfig::enabled())
        .with_backend("beta_cli", BackendConfig::enabled())
        .with_backend("gamma", BackendConfig::enabled())
        .with_backend("unheard_of", BackendConfig::enabled());

    let router = ProviderRouter::from_config(&config, &test_registry())
        .await
        .unwrap();
    assert_eq!(router.available_backends(), vec!["gamma".to_string()]);
}

#[tokio::test]
async fn test_unreachable_builtin_backend_reports_how_to_start_it() {
    let config = RouterConfig::default().with_backend(
        "ollama",
        BackendConfig::enabled()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout_secs(2),
    );

    let msg = ProviderRouter::from_config(&config, &BackendRegistry::builtin())
        .await
        .unwrap_err()
        .to_string();
    assert!(msg.contains("ollama serve"));
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_viable_preferred_backend_always_wins() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let mut tasks: Vec<TaskType> = TaskType::KNOWN.to_vec();
    tasks.push(TaskType::from("poetry"));
    for task in &tasks {
        let chosen = router.select_adapter(task, 500, Some("fast"), &[]).unwrap();
        assert_eq!(chosen.name(), "fast", "{task}");
    }
}

#[tokio::test]
async fn test_unknown_task_still_finds_a_backend() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;
    let task = TaskType::from("poetry");

    let chosen = router.select_adapter(&task, 500, None, &[]).unwrap();
    assert_eq!(chosen.name(), "fast");

    let chosen = router.select_adapter(&task, 10_000, None, &[]).unwrap();
    assert_eq!(chosen.name(), "smart");

    let chosen = router.select_adapter(&task, 200_000, Some("ghost"), &[]).unwrap();
    assert_eq!(chosen.name(), "smart");
}

#[tokio::test]
async fn test_oversized_context_has_no_viable_backend() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let err = router
        .select_adapter(&TaskType::Planning, 200_001, Some("smart"), &[])
        .err()
        .unwrap();
    match err {
        Error::NoViableBackend {
            task_type,
            context_size,
        } => {
            assert_eq!(task_type, "planning");
            assert_eq!(context_size, 200_001);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_required_capabilities_filter_backends() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let chosen = router
        .select_adapter(&TaskType::CodeGeneration, 100, Some("fast"), &[Capability::Planning])
        .unwrap();
    assert_eq!(chosen.name(), "smart");

    let err = router
        .select_adapter(&TaskType::CodeGeneration, 100, None, &[Capability::Multimodal])
        .err()
        .unwrap();
    assert!(matches!(err, Error::NoViableBackend { .. }));
}

// ============================================================================
// Completion
// ============================================================================

#[tokio::test]
async fn test_planning_routes_to_preferred_row() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let routed = router
        .complete(RouteRequest::new(prompt(500), "planning"))
        .await
        .unwrap();

    assert_eq!(routed.backend, "smart");
    assert_eq!(routed.model, "smart-large");
    assert_eq!(routed.content, "mock response from smart");
    assert_eq!(smart.call_count(), 1);
    assert_eq!(fast.call_count(), 0);
}

#[tokio::test]
async fn test_preferred_backend_overrides_row() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let routed = router
        .complete(RouteRequest::new(prompt(500), "planning").prefer("fast"))
        .await
        .unwrap();
    assert_eq!(routed.backend, "fast");
}

#[tokio::test]
async fn test_preferred_backend_too_small_falls_through() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let routed = router
        .complete(RouteRequest::new(prompt(10_000), "planning").prefer("fast"))
        .await
        .unwrap();
    assert_eq!(routed.backend, "smart");
    assert_eq!(fast.call_count(), 0);
}

#[tokio::test]
async fn test_request_settings_reach_the_adapter() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let routed = router
        .complete(
            RouteRequest::new(prompt(10), "review")
                .prefer("smart")
                .with_model("smart-xl")
                .with_temperature(0.2)
                .with_max_tokens(256),
        )
        .await
        .unwrap();
    assert_eq!(routed.model, "smart-xl");

    let calls = smart.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model.as_deref(), Some("smart-xl"));
    assert_eq!(calls[0].max_tokens, 256);
    assert!((calls[0].temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(calls[0].messages, prompt(10));
}

#[tokio::test]
async fn test_backend_failure_is_not_retried() {
    let fast = fast();
    let smart = Arc::new(
        MockAdapter::new("smart")
            .with_max_context_tokens(200_000)
            .with_error(BackendErrorKind::Unreachable, "connection refused"),
    );
    let router = router(&fast, &smart).await;

    let err = router
        .complete(RouteRequest::new(prompt(500), "planning"))
        .await
        .unwrap_err();

    assert_eq!(err.backend_kind(), Some(BackendErrorKind::Unreachable));
    assert!(err.to_string().contains("smart"));
    assert_eq!(smart.call_count(), 1);
    assert_eq!(fast.call_count(), 0);
}

#[tokio::test]
async fn test_routing_config_supplies_default_preference() {
    let (fast, smart) = (fast(), smart());
    let mut routing = RoutingConfig::default();
    routing
        .task_routing
        .insert("planning".to_string(), "fast".to_string());
    routing
        .task_preferences
        .insert("review".to_string(), vec!["fast".to_string()]);
    let router = router(&fast, &smart).await.with_routing(routing);

    let routed = router
        .complete(RouteRequest::new(prompt(100), "planning"))
        .await
        .unwrap();
    assert_eq!(routed.backend, "fast");

    let routed = router
        .complete(RouteRequest::new(prompt(100), "planning").prefer("smart"))
        .await
        .unwrap();
    assert_eq!(routed.backend, "smart");

    let chosen = router
        .select_adapter(&TaskType::Review, 100, None, &[])
        .unwrap();
    assert_eq!(chosen.name(), "fast");
}

#[tokio::test]
async fn test_shared_context_carries_answers_between_backends() {
    let fast = Arc::new(
        MockAdapter::new("fast")
            .with_max_context_tokens(4_000)
            .with_reply("fn main() {}"),
    );
    let smart = Arc::new(
        MockAdapter::new("smart")
            .with_max_context_tokens(200_000)
            .with_reply("step 1: write main"),
    );
    let window = Arc::new(Mutex::new(SharedContextWindow::new(10_000)));
    window.lock().unwrap().add_message(
        MessageRole::System,
        "You are a coding assistant.",
        None,
        None,
        None,
    );
    let router = router(&fast, &smart).await.with_shared_context(Arc::clone(&window));

    router
        .complete(
            RouteRequest::new(
                vec![Message::system("not recorded"), Message::user("plan it")],
                "planning",
            )
            .with_shared_context(true),
        )
        .await
        .unwrap();

    let routed = router
        .complete(
            RouteRequest::new(vec![Message::user("implement it")], "code_generation")
                .prefer("fast")
                .with_shared_context(true),
        )
        .await
        .unwrap();
    assert_eq!(routed.backend, "fast");

    let seen: Vec<String> = fast.calls()[0]
        .messages
        .iter()
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(
        seen,
        vec![
            "You are a coding assistant.",
            "plan it",
            "step 1: write main",
            "implement it",
        ]
    );

    let window = window.lock().unwrap();
    assert_eq!(window.len(), 5);
    assert_eq!(window.backend_counts().get("smart"), Some(&1));
    let last = &window.entries()[4];
    assert_eq!(last.backend.as_deref(), Some("fast"));
    assert_eq!(last.model.as_deref(), Some("mock-model"));
    assert_eq!(last.content, "fn main() {}");
}

#[tokio::test]
async fn test_shared_context_without_window_uses_request_messages() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;
    assert!(router.shared_context().is_none());

    router
        .complete(RouteRequest::new(prompt(5), "planning").with_shared_context(true))
        .await
        .unwrap();
    assert_eq!(smart.calls()[0].messages, prompt(5));
}

// ============================================================================
// Inspection
// ============================================================================

#[tokio::test]
async fn test_backend_info() {
    let (fast, smart) = (fast(), smart());
    let router = router(&fast, &smart).await;

    let info = router.backend_info("smart").unwrap();
    assert_eq!(info.name, "smart");
    assert_eq!(info.default_model, "smart-large");
    assert_eq!(info.max_context_tokens, 200_000);
    assert_eq!(
        info.capabilities,
        vec![Capability::Planning, Capability::CodeGeneration]
    );

    assert!(matches!(
        router.backend_info("ghost"),
        Err(Error::UnknownBackend(name)) if name == "ghost"
    ));

    let names: Vec<_> = router
        .all_backend_info()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["fast", "smart"]);

    assert_eq!(router.adapter("fast").map(|a| a.max_context_tokens()), Some(4_000));
    assert!(router.adapter("ghost").is_none());
}

#[tokio::test]
async fn test_replacing_preferences_keeps_routing_overrides() {
    let (fast, smart) = (fast(), smart());
    let mut routing = RoutingConfig::default();
    routing
        .task_preferences
        .insert("review".to_string(), vec!["fast".to_string()]);
    routing.fallback_order = vec!["smart".to_string()];

    let router = ProviderRouter::new(adapters(&[&fast, &smart]))
        .await
        .unwrap()
        .with_routing(routing)
        .with_preferences(TaskPreferences::empty().with_row("review", ["smart"]));

    assert_eq!(router.preferences().order_for(&TaskType::Review), ["fast"]);
    assert_eq!(router.preferences().fallback(), ["smart"]);
    let chosen = router
        .select_adapter(&TaskType::Review, 100, None, &[])
        .unwrap();
    assert_eq!(chosen.name(), "fast");
}
