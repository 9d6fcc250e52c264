//! End-to-end routing scenarios: classification, branch ordering, branch
//! skipping, policy handling and state passthrough.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use laminar_extract::catalog::split_residual;
use laminar_extract::config::UNKNOWN_STREAMS_KEY;
use laminar_extract::testing::{
    concurrent_stream, incremental_stream, plain_stream, FailingEngine, MockConcurrentEngine,
    MockSequentialEngine, StaticStreamProvider,
};
use laminar_extract::{
    ConfiguredCatalog, ConfiguredStream, DeclaredStream, ExtractError, ExtractRouter, Message,
    RouterConfig, SourceConfig, SourceState, StateManager, StreamClassifier, StreamDescriptor,
    StreamRegistry,
};

fn catalog(names: &[&str]) -> ConfiguredCatalog {
    ConfiguredCatalog::new(
        names
            .iter()
            .map(|n| ConfiguredStream::full_refresh(*n))
            .collect(),
    )
}

fn record_names(messages: &[Result<Message, ExtractError>]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| m.as_ref().ok())
        .filter(|m| m.is_record())
        .filter_map(Message::stream)
        .map(|d| d.name.clone())
        .collect()
}

fn stream_names(messages: &[Result<Message, ExtractError>]) -> Vec<String> {
    messages
        .iter()
        .map(|m| {
            m.as_ref()
                .ok()
                .and_then(Message::stream)
                .map(|d| d.name.clone())
                .unwrap_or_default()
        })
        .collect()
}

struct Harness {
    concurrent: Arc<MockConcurrentEngine>,
    sequential: Arc<MockSequentialEngine>,
    router: ExtractRouter,
}

fn harness(declared: Vec<DeclaredStream>, config: RouterConfig) -> Harness {
    let concurrent = Arc::new(MockConcurrentEngine::new(3));
    let sequential = Arc::new(MockSequentialEngine::new(1));
    let router = ExtractRouter::new(
        Arc::new(StaticStreamProvider::new(declared)),
        concurrent.clone(),
        sequential.clone(),
        config,
    );
    Harness {
        concurrent,
        sequential,
        router,
    }
}

#[tokio::test]
async fn test_mixed_catalog_with_unknown_stream() {
    let h = harness(
        vec![concurrent_stream("A"), plain_stream("B")],
        RouterConfig::default(),
    );

    let messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &catalog(&["A", "B", "C"]), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert!(messages.iter().all(Result::is_ok));
    // Three records for A, its final state, then B's record
    assert_eq!(stream_names(&messages), vec!["A", "A", "A", "A", "B"]);
    assert!(matches!(messages[3], Ok(Message::State(_))));
    assert_eq!(record_names(&messages), vec!["A", "A", "A", "B"]);
    assert_eq!(h.concurrent.invocations(), vec![vec!["A".to_string()]]);

    let calls = h.sequential.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].catalog.stream_names(), vec!["B"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_messages_precede_sequential() {
    let h = harness(
        vec![
            concurrent_stream("c1"),
            concurrent_stream("c2"),
            concurrent_stream("c3"),
            plain_stream("s1"),
            plain_stream("s2"),
        ],
        RouterConfig::default(),
    );

    let messages: Vec<_> = h
        .router
        .read(
            &SourceConfig::new("test"),
            &catalog(&["s1", "c1", "s2", "c2", "c3"]),
            None,
        )
        .await
        .unwrap()
        .collect()
        .await;

    let names = stream_names(&messages);
    assert_eq!(names.len(), 14);

    let first_sequential = names.iter().position(|n| n.starts_with('s')).unwrap();
    assert_eq!(first_sequential, 12);
    assert!(names[..12].iter().all(|n| n.starts_with('c')));
    // Sequential engine honors catalog order
    assert_eq!(&names[12..], &["s1".to_string(), "s2".to_string()]);
}

#[tokio::test]
async fn test_only_plain_streams_skip_concurrent_engine() {
    let h = harness(
        vec![plain_stream("a"), plain_stream("b")],
        RouterConfig::default(),
    );

    let messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &catalog(&["a", "b"]), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(messages.len(), 2);
    assert_eq!(h.concurrent.invocation_count(), 0);
    assert_eq!(h.sequential.invocation_count(), 1);
}

#[tokio::test]
async fn test_only_concurrent_streams_skip_sequential_engine() {
    let h = harness(
        vec![concurrent_stream("a"), concurrent_stream("b")],
        RouterConfig::default(),
    );

    let messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &catalog(&["a", "b"]), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(messages.len(), 8);
    assert_eq!(h.concurrent.invocation_count(), 1);
    assert_eq!(h.sequential.invocation_count(), 0);
}

#[tokio::test]
async fn test_empty_catalog_yields_nothing() {
    let h = harness(vec![concurrent_stream("a")], RouterConfig::default());

    let messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &ConfiguredCatalog::default(), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert!(messages.is_empty());
    assert_eq!(h.concurrent.invocation_count(), 0);
    assert_eq!(h.sequential.invocation_count(), 0);
}

#[tokio::test]
async fn test_strict_policy_from_source_config() {
    let mut config = SourceConfig::new("test");
    config.set(UNKNOWN_STREAMS_KEY, "FAIL");
    let router_config = RouterConfig::from_source_config(&config).unwrap();

    let h = harness(vec![concurrent_stream("A"), plain_stream("B")], router_config);
    let result = h.router.read(&config, &catalog(&["A", "B", "C"]), None).await;

    assert!(matches!(result, Err(ExtractError::UnknownStream { name }) if name == "C"));
    assert_eq!(h.concurrent.invocation_count(), 0);
    assert_eq!(h.sequential.invocation_count(), 0);
}

#[tokio::test]
async fn test_sequential_engine_receives_original_state() {
    let state: SourceState = serde_json::from_value(json!([
        {"stream": {"name": "a"}, "data": {"id": 7}},
        {"stream": {"name": "b"}, "data": {"page": 2}}
    ]))
    .unwrap();

    let h = harness(
        vec![concurrent_stream("a"), plain_stream("b")],
        RouterConfig::default(),
    );
    let _messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &catalog(&["a", "b"]), Some(state.clone()))
        .await
        .unwrap()
        .collect()
        .await;

    let calls = h.sequential.calls();
    assert_eq!(calls.len(), 1);
    // Not filtered down to the residual streams
    assert_eq!(calls[0].state.as_ref(), Some(&state));
}

#[tokio::test]
async fn test_engine_error_forwarded_after_concurrent_output() {
    let router = ExtractRouter::new(
        Arc::new(StaticStreamProvider::new(vec![
            concurrent_stream("a"),
            plain_stream("b"),
        ])),
        Arc::new(MockConcurrentEngine::new(2)),
        Arc::new(FailingEngine::new("sequential read failed")),
        RouterConfig::default(),
    );

    let messages: Vec<_> = router
        .read(&SourceConfig::new("test"), &catalog(&["a", "b"]), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(messages.len(), 4);
    assert!(messages[..3].iter().all(Result::is_ok));
    assert!(matches!(&messages[3], Err(ExtractError::Engine(m)) if m == "sequential read failed"));

    let snap = router.metrics().snapshot();
    assert_eq!(snap.concurrent_messages_total, 3);
    assert_eq!(snap.errors_total, 1);
}

#[tokio::test]
async fn test_incremental_progress_reaches_state_manager() {
    let manager = Arc::new(StateManager::new(None).unwrap());
    let h = harness(
        vec![incremental_stream("events", &manager)],
        RouterConfig::default(),
    );

    let _messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &catalog(&["events"]), None)
        .await
        .unwrap()
        .collect()
        .await;

    let state = manager.get_stream_state(&StreamDescriptor::new("events"));
    assert_eq!(state["id"], 3);
}

#[tokio::test]
async fn test_incremental_progress_never_regresses() {
    let seed: SourceState = serde_json::from_value(json!([
        {"stream": {"name": "events"}, "data": {"id": 50}}
    ]))
    .unwrap();
    let manager = Arc::new(StateManager::new(Some(&seed)).unwrap());
    let h = harness(
        vec![incremental_stream("events", &manager)],
        RouterConfig::default(),
    );

    let _messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &catalog(&["events"]), Some(seed))
        .await
        .unwrap()
        .collect()
        .await;

    let state = manager.get_stream_state(&StreamDescriptor::new("events"));
    assert_eq!(state["id"], 50);
}

#[tokio::test]
async fn test_registry_as_provider() {
    let registry = StreamRegistry::new();
    registry.register_fn("users", |_config| Ok(concurrent_stream("users")));
    registry.register_fn("orders", |_config| Ok(plain_stream("orders")));

    let sequential = Arc::new(MockSequentialEngine::new(2));
    let router = ExtractRouter::new(
        Arc::new(registry),
        Arc::new(MockConcurrentEngine::new(1)),
        sequential.clone(),
        RouterConfig::default(),
    );

    let messages: Vec<_> = router
        .read(&SourceConfig::new("test"), &catalog(&["orders", "users"]), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(stream_names(&messages), vec!["users", "users", "orders", "orders"]);
    assert_eq!(record_names(&messages), vec!["users", "orders", "orders"]);
    assert_eq!(sequential.calls()[0].catalog.stream_names(), vec!["orders"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cursor_state_reaches_output_before_sequential() {
    let manager = Arc::new(StateManager::new(None).unwrap());
    let h = harness(
        vec![
            concurrent_stream("A"),
            incremental_stream("I", &manager),
            plain_stream("B"),
        ],
        RouterConfig::default(),
    );

    let messages: Vec<_> = h
        .router
        .read(&SourceConfig::new("test"), &catalog(&["A", "I", "B", "C"]), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert!(messages.iter().all(Result::is_ok));
    let first_sequential = stream_names(&messages)
        .iter()
        .position(|n| n == "B")
        .unwrap();

    let state_position = |name: &str| {
        messages.iter().position(|m| {
            matches!(m, Ok(Message::State(s)) if s.stream.name == name)
        })
    };
    let a_state = state_position("A").unwrap();
    let i_state = state_position("I").unwrap();
    assert!(a_state < first_sequential);
    assert!(i_state < first_sequential);

    match &messages[a_state] {
        Ok(Message::State(s)) => assert_eq!(s.data["__no_cursor_state"], true),
        other => panic!("expected state message, got {other:?}"),
    }
    match &messages[i_state] {
        Ok(Message::State(s)) => assert_eq!(s.data["id"], 3),
        other => panic!("expected state message, got {other:?}"),
    }

    assert_eq!(manager.streams(), vec![StreamDescriptor::new("I")]);
}

#[test]
fn test_partition_is_complete_and_disjoint() {
    let declared = vec![
        concurrent_stream("a"),
        plain_stream("b"),
        concurrent_stream("c"),
        plain_stream("d"),
    ];
    let catalog = catalog(&["d", "a", "b", "c", "a"]);

    let classification = StreamClassifier::default()
        .classify(&catalog, &declared)
        .unwrap();
    let concurrent = classification.concurrent_names();
    let residual = split_residual(&catalog, &concurrent);

    let residual_names: HashSet<String> = residual
        .stream_names()
        .into_iter()
        .map(String::from)
        .collect();
    let all: HashSet<String> = catalog
        .stream_names()
        .into_iter()
        .map(String::from)
        .collect();

    assert!(concurrent.is_disjoint(&residual_names));
    assert_eq!(
        concurrent.union(&residual_names).cloned().collect::<HashSet<_>>(),
        all
    );
    assert_eq!(residual.stream_names(), vec!["d", "b"]);
}
