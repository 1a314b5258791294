//! Health monitoring: probes, selective restart, the timer, and the
//! end-to-end store scenario.

mod common;

use common::Harness;
use serde_json::json;
use std::time::Duration;
use switchboard_orchestrator::{HealthState, OrchestratorError, ServiceStatus};
use switchboard_test::{AdapterScript, MockConnector, fallback_config, store_scenario_config};

#[tokio::test]
async fn store_scenario_restart_fails() {
    let h = Harness::new(store_scenario_config());

    h.orchestrator.initialize().await.unwrap();
    assert_eq!(h.status("A").await, ServiceStatus::Active);
    assert_eq!(h.status("B").await, ServiceStatus::Inactive);

    let response = h
        .orchestrator
        .execute("store", "get", json!({"k": 1}))
        .await
        .unwrap();
    assert_eq!(response.service, "A");

    h.connector.control("A").unwrap().kill();
    h.connector.set_script("A", AdapterScript::refusing());
    let report = h.orchestrator.health_monitor().sweep().await;

    assert_eq!(report.failed, vec!["A"]);
    assert_eq!(report.restart_failed, vec!["A"]);
    assert_eq!(h.connector.spawn_count("A"), 2);
    assert_eq!(h.status("A").await, ServiceStatus::Error);

    let err = h
        .orchestrator
        .execute("store", "get", json!({"k": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoServiceAvailable { .. }));
    assert_eq!(h.connector.spawn_count("B"), 0, "B is never auto-promoted");
    h.assert_invariants().await;
}

#[tokio::test]
async fn store_scenario_restart_succeeds() {
    let h = Harness::new(store_scenario_config());
    h.orchestrator.initialize().await.unwrap();

    h.connector.control("A").unwrap().kill();
    let report = h.orchestrator.health_monitor().sweep().await;

    assert_eq!(report.restarted, vec!["A"]);
    assert_eq!(h.status("A").await, ServiceStatus::Active);
    assert_eq!(h.orchestrator.store().client("A").await.unwrap().generation, 2);

    let response = h
        .orchestrator
        .execute("store", "get", json!({"k": 1}))
        .await
        .unwrap();
    assert_eq!(response.service, "A");
    assert_eq!(h.connector.controls("A")[1].call_count(), 1);
    h.assert_invariants().await;
}

#[tokio::test]
async fn restart_is_selective() {
    let h = Harness::new(fallback_config());
    h.orchestrator.initialize().await.unwrap();
    h.orchestrator.start("B").await.unwrap();

    h.connector.control("A").unwrap().kill();
    h.connector.control("B").unwrap().kill();
    let report = h.orchestrator.health_monitor().sweep().await;

    assert_eq!(report.probed, vec!["A", "B", "C"]);
    assert_eq!(report.failed, vec!["A", "B"]);
    assert_eq!(report.restarted, vec!["A"]);
    assert_eq!(h.connector.spawn_count("A"), 2);
    assert_eq!(h.connector.spawn_count("B"), 1);
    assert_eq!(h.status("B").await, ServiceStatus::Error);

    // B stays down across later sweeps.
    let report = h.orchestrator.health_monitor().sweep().await;
    assert!(report.all_healthy());
    assert_eq!(report.probed, vec!["A", "C"]);
    assert_eq!(h.status("B").await, ServiceStatus::Error);
    h.assert_invariants().await;
}

#[tokio::test]
async fn healthy_sweep_changes_nothing() {
    let h = Harness::new(fallback_config());
    h.orchestrator.initialize().await.unwrap();

    let report = h.orchestrator.health_monitor().sweep().await;

    assert!(report.all_healthy());
    assert_eq!(report.probed, vec!["A", "C"]);
    assert_eq!(h.connector.spawn_count("A"), 1);
    assert_eq!(h.connector.control("A").unwrap().probe_count(), 2);
}

#[tokio::test]
async fn sequential_probes_give_the_same_result() {
    let mut config = fallback_config();
    config.orchestrator.probe_concurrency = 1;
    let h = Harness::new(config);
    h.orchestrator.initialize().await.unwrap();

    h.connector.control("C").unwrap().kill();
    let report = h.orchestrator.health_monitor().sweep().await;

    assert_eq!(report.failed, vec!["C"]);
    assert_eq!(report.restarted, vec!["C"]);
    h.assert_invariants().await;
}

#[tokio::test(start_paused = true)]
async fn wedged_adapter_fails_its_probe_by_timeout() {
    let h = Harness::new(fallback_config());
    h.orchestrator.initialize().await.unwrap();

    h.connector.control("A").unwrap().stall();
    let report = h.orchestrator.health_monitor().sweep().await;

    assert_eq!(report.failed, vec!["A"]);
    assert_eq!(report.restarted, vec!["A"]);
    let snapshot = h.orchestrator.store().get("A").await.unwrap();
    assert_eq!(snapshot.status, ServiceStatus::Active);
    assert_eq!(snapshot.generation, 2);
}

#[tokio::test(start_paused = true)]
async fn timer_drives_sweeps() {
    let h = Harness::new(store_scenario_config());
    h.orchestrator.initialize().await.unwrap();
    let period = h.orchestrator.settings().health_interval();

    h.connector.control("A").unwrap().kill();
    tokio::time::sleep(period.saturating_sub(Duration::from_secs(1))).await;
    assert_eq!(h.connector.spawn_count("A"), 1, "no sweep before the first period");

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if h.connector.spawn_count("A") == 2 {
            break;
        }
    }
    assert_eq!(h.connector.spawn_count("A"), 2);
    assert_eq!(h.status("A").await, ServiceStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn initialize_twice_arms_one_timer() {
    let h = Harness::new(store_scenario_config());
    h.orchestrator.initialize().await.unwrap();
    h.orchestrator.initialize().await.unwrap();
    let period = h.orchestrator.settings().health_interval();

    tokio::time::sleep(period.saturating_mul(3).saturating_add(Duration::from_secs(1))).await;

    // Initial handshake plus one probe per tick.
    assert_eq!(h.connector.control("A").unwrap().probe_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_timer() {
    let h = Harness::new(store_scenario_config());
    h.orchestrator.initialize().await.unwrap();
    h.orchestrator.shutdown().await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connector.spawn_count("A"), 1);
    assert_eq!(h.connector.control("A").unwrap().probe_count(), 1);
}

#[tokio::test]
async fn status_tracks_failures() {
    let h = Harness::with_connector(store_scenario_config(), MockConnector::new());
    h.orchestrator.initialize().await.unwrap();

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.health, HealthState::Healthy);
    assert_eq!(status.coverage.capabilities_routable, 1);
    assert_eq!(status.coverage.capabilities_total, 2);

    h.connector.control("A").unwrap().kill();
    h.connector.set_script("A", AdapterScript::refusing());
    h.orchestrator.health_monitor().sweep().await;

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.health, HealthState::Unhealthy);
    assert_eq!(status.coverage.active, 0);
    let a = &status.services[0];
    assert_eq!(a.status, ServiceStatus::Error);
    assert!(a.last_error.is_some());
}
