//! Shared test harness for integration tests.

use std::sync::Arc;

use switchboard_orchestrator::{Orchestrator, ServiceStatus, StaticEnv, SwitchboardConfig};
use switchboard_test::{MockConnector, init_test_logging};

/// An orchestrator wired to a [`MockConnector`].
#[allow(dead_code)]
pub struct Harness {
    /// The orchestrator under test.
    pub orchestrator: Arc<Orchestrator>,
    /// The connector; clones share state with the one inside the orchestrator.
    pub connector: MockConnector,
}

#[allow(dead_code)]
impl Harness {
    /// Build a harness with healthy adapters and an empty environment.
    pub fn new(config: SwitchboardConfig) -> Self {
        Self::with(config, MockConnector::new(), StaticEnv::new())
    }

    /// Build a harness with a scripted connector.
    pub fn with_connector(config: SwitchboardConfig, connector: MockConnector) -> Self {
        Self::with(config, connector, StaticEnv::new())
    }

    /// Build a harness with a scripted connector and environment.
    pub fn with(config: SwitchboardConfig, connector: MockConnector, env: StaticEnv) -> Self {
        init_test_logging();
        let orchestrator = Orchestrator::with_env(config, Arc::new(connector.clone()), Arc::new(env))
            .expect("test config must validate");
        Self {
            orchestrator: Arc::new(orchestrator),
            connector,
        }
    }

    /// Status of `id`.
    pub async fn status(&self, id: &str) -> ServiceStatus {
        self.orchestrator
            .store()
            .status(id)
            .await
            .expect("id must be registered")
    }

    /// Assert the single-owner and status/client invariants for every
    /// adapter: `Active` exactly when one live client exists.
    pub async fn assert_invariants(&self) {
        for snapshot in self.orchestrator.store().all().await {
            let id = snapshot.id();
            let active = snapshot.status == ServiceStatus::Active;
            assert_eq!(active, snapshot.has_client, "{id}: status/client disagree");
            assert_eq!(
                self.connector.live_clients(id),
                usize::from(active),
                "{id}: live client count does not match status {}",
                snapshot.status
            );
        }
    }
}
