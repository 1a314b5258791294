//! Lifecycle tests: startup, explicit start/stop, shutdown, drop.

mod common;

use common::Harness;
use serde_json::json;
use switchboard_orchestrator::{OrchestratorError, ServiceDefinition, ServiceStatus, StaticEnv};
use switchboard_test::{AdapterScript, MockConnector, fallback_config, store_scenario_config};

#[tokio::test]
async fn initialize_starts_critical_set_in_registration_order() {
    let h = Harness::new(fallback_config());

    let report = h.orchestrator.initialize().await.unwrap();

    assert_eq!(report.started, vec!["A", "C"]);
    let order: Vec<_> = h.connector.spawned().into_iter().map(|s| s.id).collect();
    assert_eq!(order, vec!["A", "C"]);
    assert_eq!(h.status("A").await, ServiceStatus::Active);
    assert_eq!(h.status("B").await, ServiceStatus::Inactive);
    assert_eq!(h.status("C").await, ServiceStatus::Active);
    h.assert_invariants().await;
}

#[tokio::test]
async fn initialize_accepts_partial_availability() {
    let h = Harness::with_connector(fallback_config(), MockConnector::new().refusing("A"));

    let report = h.orchestrator.initialize().await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "A");
    assert!(report.failed[0].error.contains("Failed to start service A"));
    assert_eq!(report.started, vec!["C"]);
    assert_eq!(h.status("A").await, ServiceStatus::Error);
    h.assert_invariants().await;
}

#[tokio::test]
async fn reinitialize_retries_failed_critical_only() {
    let h = Harness::with_connector(fallback_config(), MockConnector::new().refusing("A"));
    h.orchestrator.initialize().await.unwrap();

    h.connector.set_script("A", AdapterScript::healthy());
    let report = h.orchestrator.initialize().await.unwrap();

    assert_eq!(report.started, vec!["A"]);
    assert_eq!(report.already_active, vec!["C"]);
    assert_eq!(h.connector.spawn_count("C"), 1);
    h.assert_invariants().await;
}

#[tokio::test]
async fn unmet_dependency_is_typed_and_leaves_status() {
    let mut config = store_scenario_config();
    config.add(
        ServiceDefinition::new("postgres", "npx")
            .with_args(["-y", "server-postgres", "${DATABASE_URL}"])
            .requires("DATABASE_URL"),
    );
    let h = Harness::new(config);

    let err = h.orchestrator.start("postgres").await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::DependencyUnmet { ref id, ref variable }
            if id == "postgres" && variable == "DATABASE_URL"
    ));
    assert_eq!(h.status("postgres").await, ServiceStatus::Inactive);
    assert_eq!(h.connector.spawn_count("postgres"), 0);
}

#[tokio::test]
async fn dependency_is_resolved_into_spawn_arguments() {
    let mut config = store_scenario_config();
    config.add(
        ServiceDefinition::new("postgres", "npx")
            .with_args(["-y", "server-postgres", "${DATABASE_URL}"])
            .requires("DATABASE_URL"),
    );
    let env = StaticEnv::new().with_var("DATABASE_URL", "postgres://db/app");
    let h = Harness::with(config, MockConnector::new(), env);

    assert!(h.orchestrator.start("postgres").await.unwrap());

    let spec = h.connector.spawned().pop().unwrap();
    assert_eq!(spec.args, vec!["-y", "server-postgres", "postgres://db/app"]);
}

#[tokio::test]
async fn unknown_service() {
    let h = Harness::new(store_scenario_config());
    let err = h.orchestrator.start("ghost").await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown service: ghost");
}

#[tokio::test]
async fn starting_an_active_adapter_keeps_one_client() {
    let h = Harness::new(store_scenario_config());

    assert!(h.orchestrator.start("B").await.unwrap());
    assert!(!h.orchestrator.start("B").await.unwrap());

    let (first, second) = tokio::join!(h.orchestrator.start("A"), h.orchestrator.start("A"));
    assert!(first.unwrap() ^ second.unwrap(), "exactly one start attaches a client");

    assert_eq!(h.connector.spawn_count("B"), 1);
    assert_eq!(h.connector.live_clients("A"), 1);
    h.assert_invariants().await;
}

#[tokio::test]
async fn stop_closes_and_deactivates() {
    let h = Harness::new(store_scenario_config());
    h.orchestrator.initialize().await.unwrap();

    assert!(h.orchestrator.stop("A").await.unwrap());

    assert_eq!(h.status("A").await, ServiceStatus::Inactive);
    assert!(h.connector.control("A").unwrap().is_closed());
    h.assert_invariants().await;

    let err = h
        .orchestrator
        .execute("store", "get", json!({"k": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoServiceAvailable { .. }));
}

#[tokio::test]
async fn shutdown_closes_everything_once() {
    let h = Harness::new(fallback_config());
    h.orchestrator.initialize().await.unwrap();
    h.orchestrator.start("B").await.unwrap();

    let report = h.orchestrator.shutdown().await;

    assert!(report.is_clean());
    assert_eq!(report.closed, vec!["A", "B", "C"]);
    for id in ["A", "B", "C"] {
        assert_eq!(h.status(id).await, ServiceStatus::Inactive);
        assert!(h.connector.control(id).unwrap().is_closed());
    }
    assert!(!h.orchestrator.is_monitoring().await);
    h.assert_invariants().await;

    let again = h.orchestrator.shutdown().await;
    assert!(again.closed.is_empty());
    assert!(again.is_clean());
}

#[tokio::test]
async fn operations_after_shutdown_are_rejected() {
    let h = Harness::new(store_scenario_config());
    h.orchestrator.initialize().await.unwrap();
    h.orchestrator.shutdown().await;

    assert!(matches!(h.orchestrator.initialize().await, Err(OrchestratorError::ShutDown)));
    assert!(matches!(h.orchestrator.start("A").await, Err(OrchestratorError::ShutDown)));
    assert!(matches!(h.orchestrator.stop("A").await, Err(OrchestratorError::ShutDown)));
    assert!(matches!(
        h.orchestrator.execute("store", "get", json!({})).await,
        Err(OrchestratorError::ShutDown)
    ));
    assert_eq!(h.connector.spawn_count("A"), 1);
}

#[tokio::test]
async fn shutdown_collects_close_failures() {
    let script = AdapterScript {
        fail_close: true,
        ..AdapterScript::healthy()
    };
    let h = Harness::with_connector(
        store_scenario_config(),
        MockConnector::new().with_script("A", script),
    );
    h.orchestrator.initialize().await.unwrap();

    let report = h.orchestrator.shutdown().await;

    assert!(!report.is_clean());
    assert!(matches!(
        report.failures[0],
        OrchestratorError::ShutdownFailed { ref id, .. } if id == "A"
    ));
    assert_eq!(h.status("A").await, ServiceStatus::Inactive);
    h.assert_invariants().await;
}

#[tokio::test]
async fn dropping_the_orchestrator_releases_clients() {
    let h = Harness::new(store_scenario_config());
    h.orchestrator.initialize().await.unwrap();
    h.orchestrator.start("B").await.unwrap();
    assert_eq!(h.connector.live_clients("A"), 1);

    let connector = h.connector.clone();
    drop(h);

    // The monitor task is aborted on drop and releases its handles when the
    // runtime next polls it.
    for _ in 0..20 {
        if connector.live_clients("A") == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(connector.live_clients("A"), 0);
    assert_eq!(connector.live_clients("B"), 0);
}
