//! Test fixtures for common configurations.

use switchboard_orchestrator::{OrchestratorSettings, ServiceDefinition, SwitchboardConfig};

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`; output goes through the test harness capture.
pub fn init_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Settings with short timeouts and no default route.
#[must_use]
pub fn test_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        health_interval_secs: 10,
        probe_timeout_secs: 2,
        handshake_timeout_secs: 5,
        call_timeout_secs: 3,
        shutdown_timeout_secs: 1,
        probe_concurrency: 4,
        default_route: String::new(),
    }
}

/// A definition launching `adapter-<id>` with the given capabilities.
#[must_use]
pub fn test_definition<I, S>(id: &str, capabilities: I) -> ServiceDefinition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ServiceDefinition::new(id, format!("adapter-{id}")).with_capabilities(capabilities)
}

/// Two adapters sharing `store`: `A` (critical) then `B`, with
/// `store = [A, B]`.
#[must_use]
pub fn store_scenario_config() -> SwitchboardConfig {
    let mut config = SwitchboardConfig {
        orchestrator: test_settings(),
        ..SwitchboardConfig::default()
    };
    config.add(test_definition("A", ["store"]).critical());
    config.add(test_definition("B", ["store", "net"]));
    config.add_route("store", ["A", "B"]);
    config
}

/// Three adapters `A`, `B`, `C` all serving `db`, routed in that order.
/// `A` and `C` are critical.
#[must_use]
pub fn fallback_config() -> SwitchboardConfig {
    let mut config = SwitchboardConfig {
        orchestrator: test_settings(),
        ..SwitchboardConfig::default()
    };
    config.add(test_definition("A", ["db"]).critical());
    config.add(test_definition("B", ["db"]));
    config.add(test_definition("C", ["db"]).critical());
    config.add_route("db", ["A", "B", "C"]);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_validate() {
        store_scenario_config().validate().unwrap();
        fallback_config().validate().unwrap();
        assert_eq!(fallback_config().critical_ids(), vec!["A", "C"]);
    }
}
