//! Lifecycle manager.
//!
//! [`Orchestrator`] wires the store, supervisor, health monitor and router
//! together and owns the `initialize` / `shutdown` phases. It is an explicit
//! instance; share it with `Arc`.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterClient, AdapterConnector, StdioConnector};
use crate::config::{OrchestratorSettings, SwitchboardConfig};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::health::{HealthMonitor, MonitorHandle};
use crate::router::CapabilityRouter;
use crate::routing::RoutingTable;
use crate::status::OrchestratorStatus;
use crate::store::{ServiceStatus, ServiceStore};
use crate::supervisor::ProcessSupervisor;
use crate::types::AdapterResponse;

/// Outcome of [`Orchestrator::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    /// Critical adapters started by this call.
    pub started: Vec<String>,
    /// Critical adapters that were already active.
    pub already_active: Vec<String>,
    /// Critical adapters that could not be started.
    pub failed: Vec<StartFailure>,
}

impl InitReport {
    /// Whether every critical adapter is up.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A critical adapter that failed to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartFailure {
    /// Adapter id.
    pub id: String,
    /// Error message.
    pub error: String,
}

/// Outcome of [`Orchestrator::shutdown`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Adapters whose session closed cleanly.
    pub closed: Vec<String>,
    /// Close failures; the adapters are `Inactive` regardless.
    pub failures: Vec<OrchestratorError>,
}

impl ShutdownReport {
    /// Whether every session closed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The capability orchestrator.
///
/// Dropping it cancels the health monitor and drops every client, which
/// kills the adapter subprocesses. Call [`Self::shutdown`] for a graceful
/// close.
pub struct Orchestrator {
    settings: OrchestratorSettings,
    critical: Vec<String>,
    store: Arc<ServiceStore>,
    supervisor: Arc<ProcessSupervisor>,
    monitor: Arc<HealthMonitor>,
    router: CapabilityRouter,
    monitor_handle: Mutex<Option<MonitorHandle>>,
    shut_down: AtomicBool,
}

impl Orchestrator {
    /// Build an orchestrator that reads preconditions from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(
        config: SwitchboardConfig,
        connector: Arc<dyn AdapterConnector>,
    ) -> OrchestratorResult<Self> {
        Self::with_env(config, connector, Arc::new(ProcessEnv))
    }

    /// Build an orchestrator that spawns real stdio MCP adapters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn with_stdio(config: SwitchboardConfig) -> OrchestratorResult<Self> {
        let connector = StdioConnector::new(config.orchestrator.shutdown_timeout());
        Self::new(config, Arc::new(connector))
    }

    /// Build an orchestrator with an explicit environment source.
    ///
    /// Every definition is registered as `Inactive`; nothing is spawned
    /// until [`Self::initialize`] or [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn with_env(
        config: SwitchboardConfig,
        connector: Arc<dyn AdapterConnector>,
        env: Arc<dyn EnvSource>,
    ) -> OrchestratorResult<Self> {
        config.validate()?;

        let settings = config.orchestrator.clone();
        let critical = config.critical_ids();
        let table = RoutingTable::derive(&config.services, &config.routes, settings.default_route());

        let store = Arc::new(ServiceStore::with_definitions(config.services));
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::clone(&store),
            connector,
            env,
            settings.handshake_timeout(),
        ));
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&store),
            Arc::clone(&supervisor),
            settings.probe_timeout(),
            settings.probe_concurrency,
        ));
        let router = CapabilityRouter::new(Arc::clone(&store), table, settings.call_timeout());

        Ok(Self {
            settings,
            critical,
            store,
            supervisor,
            monitor,
            router,
            monitor_handle: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Start the health monitor, then every critical adapter in
    /// registration order.
    ///
    /// Failures are logged and reported, never raised: partial availability
    /// is acceptable. Calling this again retries failed critical adapters
    /// but never arms a second timer.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::ShutDown`] after [`Self::shutdown`].
    pub async fn initialize(&self) -> OrchestratorResult<InitReport> {
        {
            let mut handle = self.monitor_handle.lock().await;
            self.ensure_running()?;
            if handle.is_none() {
                *handle = Some(Arc::clone(&self.monitor).spawn(self.settings.health_interval()));
            }
        }

        let mut report = InitReport::default();
        for id in &self.critical {
            if self.is_shut_down() {
                break;
            }
            match self.supervisor.start(id).await {
                Ok(true) => report.started.push(id.clone()),
                Ok(false) => report.already_active.push(id.clone()),
                Err(OrchestratorError::ShutDown) => break,
                Err(e) => {
                    warn!(service = %id, error = %e, "Critical service unavailable");
                    report.failed.push(StartFailure {
                        id: id.clone(),
                        error: e.to_string(),
                    });
                },
            }
        }

        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            critical = self.critical.len(),
            "Orchestrator initialized"
        );
        Ok(report)
    }

    /// Start one adapter.
    ///
    /// # Errors
    ///
    /// See [`ProcessSupervisor::start`]; also [`OrchestratorError::ShutDown`].
    pub async fn start(&self, id: &str) -> OrchestratorResult<bool> {
        self.ensure_running()?;
        self.supervisor.start(id).await
    }

    /// Stop an active adapter and close its session.
    ///
    /// Returns `Ok(false)` if the adapter was not active.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownService`] for an unregistered id,
    /// or the close failure (the adapter is `Inactive` regardless).
    pub async fn stop(&self, id: &str) -> OrchestratorResult<bool> {
        self.ensure_running()?;
        let snapshot = self
            .store
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::UnknownService { id: id.to_string() })?;
        if snapshot.status != ServiceStatus::Active {
            return Ok(false);
        }

        match self.store.set_status(id, ServiceStatus::Inactive, None).await? {
            Some(client) => {
                self.close_client(id, client).await?;
                info!(service = id, "Service stopped");
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Route a capability request.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoServiceAvailable`] when every
    /// candidate is inactive or fails, or [`OrchestratorError::ShutDown`].
    pub async fn execute(
        &self,
        capability: &str,
        method: &str,
        params: Value,
    ) -> OrchestratorResult<AdapterResponse> {
        self.ensure_running()?;
        self.router.execute(capability, method, params).await
    }

    /// Current status of every adapter plus coverage and health.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::ShutDown`] after shutdown.
    pub async fn status(&self) -> OrchestratorResult<OrchestratorStatus> {
        self.ensure_running()?;
        let snapshots = self.store.all().await;
        Ok(OrchestratorStatus::from_snapshots(&snapshots, self.router.table()))
    }

    /// Cancel the health monitor and close every adapter session.
    ///
    /// Idempotent: later calls return an empty report. Close failures are
    /// logged and collected, never raised.
    pub async fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Orchestrator already shut down");
            return ShutdownReport::default();
        }

        let handle = self.monitor_handle.lock().await.take();
        if let Some(mut handle) = handle {
            handle.stop().await;
        }

        // Starts still in their handshake close their own client.
        let taken = self.store.close().await;

        let closes = taken.into_iter().map(|(id, client)| async move {
            let result = self.close_client(&id, client).await;
            (id, result)
        });

        let mut report = ShutdownReport::default();
        for (id, result) in futures::future::join_all(closes).await {
            match result {
                Ok(()) => report.closed.push(id),
                Err(e) => {
                    warn!(service = %id, error = %e, "Failed to close service");
                    report.failures.push(e);
                },
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failures.len(),
            "Orchestrator shut down"
        );
        report
    }

    async fn close_client(&self, id: &str, client: Arc<dyn AdapterClient>) -> OrchestratorResult<()> {
        match tokio::time::timeout(self.settings.shutdown_timeout(), client.close()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ OrchestratorError::Timeout { .. })) => Err(e),
            Ok(Err(e)) => Err(OrchestratorError::ShutdownFailed {
                id: id.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(OrchestratorError::Timeout {
                id: id.to_string(),
                operation: "close",
            }),
        }
    }

    fn ensure_running(&self) -> OrchestratorResult<()> {
        if self.is_shut_down() {
            Err(OrchestratorError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Whether [`Self::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Whether the health monitor is armed.
    pub async fn is_monitoring(&self) -> bool {
        self.monitor_handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_cancelled())
    }

    /// The definition store.
    #[must_use]
    pub fn store(&self) -> &Arc<ServiceStore> {
        &self.store
    }

    /// The routing table.
    #[must_use]
    pub fn routing_table(&self) -> &RoutingTable {
        self.router.table()
    }

    /// The health monitor, for driving sweeps directly.
    #[must_use]
    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Critical adapter ids, in registration order.
    #[must_use]
    pub fn critical_ids(&self) -> &[String] {
        &self.critical
    }

    /// Effective settings.
    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("critical", &self.critical)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
