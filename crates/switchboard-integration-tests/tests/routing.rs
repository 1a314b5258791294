//! Capability routing: fallback order, exhaustion, timeouts, default route.

mod common;

use common::Harness;
use serde_json::{Value, json};
use std::time::Duration;
use switchboard_orchestrator::{OrchestratorError, ServiceStatus, SwitchboardConfig};
use switchboard_test::{
    AdapterScript, CallBehaviour, MockConnector, fallback_config, store_scenario_config,
    test_definition, test_settings,
};

fn failing(reason: &str) -> AdapterScript {
    AdapterScript::healthy().with_calls(CallBehaviour::Fail(reason.to_string()))
}

async fn start_all(h: &Harness, ids: &[&str]) {
    for id in ids {
        h.orchestrator.start(id).await.unwrap();
    }
}

#[tokio::test]
async fn first_candidate_answers_and_short_circuits() {
    let h = Harness::new(fallback_config());
    start_all(&h, &["A", "B", "C"]).await;

    let response = h
        .orchestrator
        .execute("db", "query", json!({"sql": "select 1"}))
        .await
        .unwrap();

    assert_eq!(response.service, "A");
    assert_eq!(response.structured, Some(json!({"sql": "select 1"})));
    assert_eq!(h.connector.control("B").unwrap().call_count(), 0);
    assert_eq!(h.connector.control("C").unwrap().call_count(), 0);
}

#[tokio::test]
async fn fallback_follows_table_order() {
    let connector = MockConnector::new().with_script("A", failing("connection reset"));
    let h = Harness::with_connector(fallback_config(), connector);
    start_all(&h, &["A", "B", "C"]).await;

    let response = h.orchestrator.execute("db", "query", Value::Null).await.unwrap();

    assert_eq!(response.service, "B");
    assert_eq!(h.connector.control("A").unwrap().call_count(), 1);
    assert_eq!(h.connector.control("C").unwrap().call_count(), 0);
    // Call failures never change status; only probes do.
    assert_eq!(h.status("A").await, ServiceStatus::Active);
}

#[tokio::test]
async fn inactive_candidates_are_skipped_without_spawning() {
    let h = Harness::new(fallback_config());
    start_all(&h, &["C"]).await;

    let response = h.orchestrator.execute("db", "query", Value::Null).await.unwrap();

    assert_eq!(response.service, "C");
    assert_eq!(h.connector.spawn_count("A"), 0);
    assert_eq!(h.connector.spawn_count("B"), 0);
}

#[tokio::test]
async fn error_flagged_results_fall_back() {
    let script = AdapterScript::healthy()
        .with_calls(CallBehaviour::ErrorResult("relation does not exist".to_string()));
    let h = Harness::with_connector(fallback_config(), MockConnector::new().with_script("A", script));
    start_all(&h, &["A", "B"]).await;

    let response = h.orchestrator.execute("db", "query", Value::Null).await.unwrap();

    assert_eq!(response.service, "B");
    assert!(!response.is_error);
}

#[tokio::test]
async fn exhaustion_tries_each_candidate_once() {
    let connector = MockConnector::new()
        .with_script("A", failing("a down"))
        .with_script("B", failing("b down"))
        .with_script("C", failing("c down"));
    let h = Harness::with_connector(fallback_config(), connector);
    start_all(&h, &["A", "B", "C"]).await;

    let err = h
        .orchestrator
        .execute("db", "query", json!({"id": 7}))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "No service available for capability: db");
    for id in ["A", "B", "C"] {
        let control = h.connector.control(id).unwrap();
        assert_eq!(control.call_count(), 1, "{id}");
        assert_eq!(control.received(), vec![("query".to_string(), json!({"id": 7}))]);
    }
}

#[tokio::test]
async fn nothing_active_is_no_service_available() {
    let h = Harness::new(fallback_config());

    let err = h.orchestrator.execute("db", "query", Value::Null).await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::NoServiceAvailable { ref capability } if capability == "db"
    ));
}

#[tokio::test(start_paused = true)]
async fn hung_candidate_times_out_and_falls_back() {
    let script = AdapterScript::healthy().with_calls(CallBehaviour::Hang);
    let h = Harness::with_connector(fallback_config(), MockConnector::new().with_script("A", script));
    start_all(&h, &["A", "B"]).await;

    let started = tokio::time::Instant::now();
    let response = h.orchestrator.execute("db", "query", Value::Null).await.unwrap();

    assert_eq!(response.service, "B");
    let timeout = Duration::from_secs(test_settings().call_timeout_secs);
    assert!(started.elapsed() >= timeout);
}

#[tokio::test(start_paused = true)]
async fn slow_candidate_within_budget_still_answers() {
    let script = AdapterScript::healthy().with_calls(CallBehaviour::Delay(Duration::from_secs(1)));
    let h = Harness::with_connector(fallback_config(), MockConnector::new().with_script("A", script));
    start_all(&h, &["A", "B"]).await;

    let response = h.orchestrator.execute("db", "query", Value::Null).await.unwrap();
    assert_eq!(response.service, "A");
}

#[tokio::test]
async fn concurrent_requests_run_independent_fallbacks() {
    let connector = MockConnector::new().with_script("A", failing("busy"));
    let h = Harness::with_connector(fallback_config(), connector);
    start_all(&h, &["A", "B"]).await;

    let (first, second) = tokio::join!(
        h.orchestrator.execute("db", "query", json!({"n": 1})),
        h.orchestrator.execute("db", "query", json!({"n": 2})),
    );

    assert_eq!(first.unwrap().service, "B");
    assert_eq!(second.unwrap().service, "B");
    assert_eq!(h.connector.control("A").unwrap().call_count(), 2);
}

#[tokio::test]
async fn unmapped_capability_uses_configured_default_route() {
    let mut config = store_scenario_config();
    config.orchestrator.default_route = "B".to_string();
    let h = Harness::new(config);
    start_all(&h, &["B"]).await;

    let response = h.orchestrator.execute("translate", "run", Value::Null).await.unwrap();
    assert_eq!(response.service, "B");
}

#[tokio::test]
async fn unmapped_capability_without_default_route_fails() {
    let h = Harness::new(store_scenario_config());
    start_all(&h, &["A", "B"]).await;

    let err = h
        .orchestrator
        .execute("translate", "run", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoServiceAvailable { .. }));
}

#[tokio::test]
async fn derived_routes_follow_priority() {
    let mut config = SwitchboardConfig {
        orchestrator: test_settings(),
        ..SwitchboardConfig::default()
    };
    config.add(test_definition("puppeteer", ["web", "browser"]).with_priority(50));
    config.add(test_definition("fetch", ["web", "http"]).with_priority(10));
    let h = Harness::new(config);
    start_all(&h, &["puppeteer", "fetch"]).await;

    assert_eq!(
        h.orchestrator.routing_table().candidates("web"),
        vec!["fetch", "puppeteer"]
    );
    let response = h.orchestrator.execute("web", "fetch", Value::Null).await.unwrap();
    assert_eq!(response.service, "fetch");
}
