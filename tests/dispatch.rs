mod common;

use axum::http::StatusCode;
use common::{MockTarget, refused_url, sample_build};
use std::sync::Arc;
use tiny_webhook::DeliverySettings;
use tiny_webhook::build::BuildStatus;
use tiny_webhook::dispatch::{DispatchSummary, WebhookDispatcher};
use tiny_webhook::events::BuildEventBus;
use tiny_webhook::handler::BuildCompletionHandler;
use tiny_webhook::logging::RecentLogLayer;
use tiny_webhook::payload::PayloadBuilder;
use tiny_webhook::target::{TargetConfig, TargetRegistry};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

const ROOT_URL: &str = "https://ci.example.com";

fn dispatcher() -> WebhookDispatcher {
    WebhookDispatcher::new(&DeliverySettings {
        connect_timeout_secs: 2,
        request_timeout_secs: 2,
    })
    .unwrap()
}

fn handler_for(urls: Vec<String>) -> BuildCompletionHandler {
    BuildCompletionHandler::new(
        PayloadBuilder::new(ROOT_URL),
        dispatcher(),
        Arc::new(TargetRegistry::new(TargetConfig::new(urls))),
    )
}

#[tokio::test]
async fn test_every_target_attempted_once_despite_failures() {
    let ok_first = MockTarget::spawn(StatusCode::OK).await;
    let server_error = MockTarget::spawn(StatusCode::INTERNAL_SERVER_ERROR).await;
    let not_found = MockTarget::spawn(StatusCode::NOT_FOUND).await;
    let ok_last = MockTarget::spawn(StatusCode::NO_CONTENT).await;

    let targets = vec![
        ok_first.url.clone(),
        server_error.url.clone(),
        not_found.url.clone(),
        ok_last.url.clone(),
    ];
    let summary = dispatcher().dispatch(b"{\"buildId\":1}", &targets).await;

    assert_eq!(
        summary,
        DispatchSummary {
            attempted: 4,
            delivered: 2,
            failed: 2
        }
    );
    for target in [&ok_first, &server_error, &not_found, &ok_last] {
        assert_eq!(target.hits(), 1, "{} hit count", target.url);
    }
}

#[tokio::test]
async fn test_transport_failures_do_not_stop_delivery() {
    let reachable = MockTarget::spawn(StatusCode::OK).await;
    let targets = vec![
        refused_url().await,
        "not a url".to_string(),
        reachable.url.clone(),
    ];

    let summary = dispatcher().dispatch(b"{}", &targets).await;

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.delivered, 1);
    assert_eq!(reachable.hits(), 1);
}

#[tokio::test]
async fn test_duplicate_targets_each_receive_a_post() {
    let target = MockTarget::spawn(StatusCode::OK).await;
    let targets = vec![target.url.clone(), target.url.clone()];

    let summary = dispatcher().dispatch(b"{}", &targets).await;

    assert_eq!(summary.delivered, 2);
    assert_eq!(target.hits(), 2);
}

#[tokio::test]
async fn test_json_headers_sent() {
    let target = MockTarget::spawn(StatusCode::OK).await;
    let body = br#"{"buildId":42}"#;

    dispatcher().dispatch(body, &[target.url.clone()]).await;

    let requests = target.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(
        requests[0].content_length.as_deref(),
        Some(body.len().to_string().as_str())
    );
    assert_eq!(requests[0].body.as_ref(), body);
}

#[tokio::test]
async fn test_redirects_are_failures_and_not_followed() {
    let destination = MockTarget::spawn(StatusCode::OK).await;
    let redirecting = MockTarget::spawn_redirect(&destination.url).await;

    let summary = dispatcher().dispatch(b"{}", &[redirecting.url.clone()]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(redirecting.hits(), 1);
    assert_eq!(destination.hits(), 0);
}

#[tokio::test]
async fn test_empty_target_list_makes_no_calls() {
    let bystander = MockTarget::spawn(StatusCode::OK).await;

    let summary = dispatcher().dispatch(b"{}", &[]).await;
    assert_eq!(summary, DispatchSummary::default());

    let handler = handler_for(Vec::new());
    let summary = handler
        .on_build_finished(&sample_build(1, BuildStatus::Success))
        .await;
    assert_eq!(summary.attempted, 0);
    assert_eq!(bystander.hits(), 0);
}

#[tokio::test]
async fn test_failing_and_healthy_target_scenario() {
    let layer = RecentLogLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let target_a = MockTarget::spawn(StatusCode::INTERNAL_SERVER_ERROR).await;
    let target_b = MockTarget::spawn(StatusCode::OK).await;
    let handler = handler_for(vec![target_a.url.clone(), target_b.url.clone()]);

    let build = sample_build(77, BuildStatus::Success);
    let summary = handler.on_build_finished(&build).await;

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.failed, 1);

    let a_requests = target_a.requests();
    let b_requests = target_b.requests();
    assert_eq!(a_requests.len(), 1);
    assert_eq!(b_requests.len(), 1);
    assert_eq!(a_requests[0].body, b_requests[0].body);

    let payload: serde_json::Value = serde_json::from_slice(&b_requests[0].body).unwrap();
    assert_eq!(payload["buildId"], 77);
    assert_eq!(payload["containingChanges"].as_array().unwrap().len(), 2);
    assert_eq!(payload["containingChanges"][1]["changes"].as_array().unwrap().len(), 1);
    assert_eq!(payload["vcsRoots"].as_array().unwrap().len(), 1);

    let errors = layer.logs().entries_at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains(&target_a.url));
    assert!(errors[0].message.contains("500"));
    assert!(!errors[0].message.contains(&target_b.url));
}

#[tokio::test]
async fn test_published_event_reaches_targets() {
    let target = MockTarget::spawn(StatusCode::OK).await;
    let bus = BuildEventBus::new();
    let (_handler, _listener) = BuildCompletionHandler::attach(
        &bus,
        PayloadBuilder::new(ROOT_URL),
        dispatcher(),
        Arc::new(TargetRegistry::new(TargetConfig::new([target.url.clone()]))),
    );

    let mut previous = sample_build(10, BuildStatus::Failure);
    previous.previous_finished = Some(Box::new(sample_build(9, BuildStatus::Success)));
    let mut build = sample_build(11, BuildStatus::Success);
    build.previous_finished = Some(Box::new(previous));

    bus.publish(Arc::new(build));
    target.wait_for(1).await;

    let payload: serde_json::Value = serde_json::from_slice(&target.requests()[0].body).unwrap();
    assert_eq!(payload["buildId"], 11);
    assert_eq!(payload["rootUrl"], ROOT_URL);
    assert_eq!(payload["previousFinished"]["buildId"], 10);
    assert_eq!(payload["previousFinished"]["buildIsFailed"], true);
    assert!(payload["previousFinished"].get("previousFinished").is_none());
}

#[tokio::test]
async fn test_reloaded_targets_apply_to_later_events() {
    let old_target = MockTarget::spawn(StatusCode::OK).await;
    let new_target = MockTarget::spawn(StatusCode::OK).await;
    let registry = Arc::new(TargetRegistry::new(TargetConfig::new([old_target.url.clone()])));
    let handler = BuildCompletionHandler::new(
        PayloadBuilder::new(ROOT_URL),
        dispatcher(),
        Arc::clone(&registry),
    );

    let prepared = handler
        .prepare(&sample_build(1, BuildStatus::Success))
        .unwrap();
    registry.replace(TargetConfig::new([new_target.url.clone()]));

    // Already prepared deliveries keep their snapshot
    handler.deliver(prepared).await;
    handler
        .on_build_finished(&sample_build(2, BuildStatus::Success))
        .await;

    assert_eq!(old_target.hits(), 1);
    assert_eq!(new_target.hits(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_builds_each_delivered_once() {
    let first = MockTarget::spawn(StatusCode::OK).await;
    let second = MockTarget::spawn(StatusCode::OK).await;
    let registry = Arc::new(TargetRegistry::new(TargetConfig::new([first.url.clone()])));
    let handler = Arc::new(BuildCompletionHandler::new(
        PayloadBuilder::new(ROOT_URL),
        dispatcher(),
        Arc::clone(&registry),
    ));

    let spawn_build = |id: i64| {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            handler
                .on_build_finished(&sample_build(id, BuildStatus::Success))
                .await
        })
    };

    let mut tasks: Vec<_> = (0..10).map(&spawn_build).collect();
    registry.replace(TargetConfig::new([second.url.clone()]));
    // Builds started after the swap can only see the new list
    let late: Vec<_> = (10..20).map(&spawn_build).collect();
    tasks.extend(late);

    for task in tasks {
        let summary = task.await.unwrap();
        assert_eq!(
            summary,
            DispatchSummary {
                attempted: 1,
                delivered: 1,
                failed: 0
            }
        );
    }

    assert_eq!(first.hits() + second.hits(), 20);
    assert!(second.hits() >= 10);

    let mut ids: Vec<i64> = first
        .requests()
        .iter()
        .chain(second.requests().iter())
        .map(|request| {
            let payload: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            payload["buildId"].as_i64().unwrap()
        })
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_lagging_listener_warns_and_keeps_running() {
    let layer = RecentLogLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let target = MockTarget::spawn(StatusCode::OK).await;
    let bus = BuildEventBus::with_capacity(1);
    let (_handler, _listener) = BuildCompletionHandler::attach(
        &bus,
        PayloadBuilder::new(ROOT_URL),
        dispatcher(),
        Arc::new(TargetRegistry::new(TargetConfig::new([target.url.clone()]))),
    );

    // The listener cannot run before this loop yields
    for id in 1..=5 {
        bus.publish(Arc::new(sample_build(id, BuildStatus::Success)));
    }
    target.wait_for(1).await;

    let warnings = layer.logs().entries_at(Level::WARN);
    assert!(
        warnings
            .iter()
            .any(|entry| entry.message.contains("lagged, 4 events dropped")),
        "{:?}",
        warnings
    );

    let payload: serde_json::Value = serde_json::from_slice(&target.requests()[0].body).unwrap();
    assert_eq!(payload["buildId"], 5);

    bus.publish(Arc::new(sample_build(6, BuildStatus::Success)));
    target.wait_for(2).await;
    assert_eq!(target.hits(), 2);
}
