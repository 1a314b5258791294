//! Process supervisor: brings one adapter from `Inactive`/`Error` to
//! `Active`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterClient, AdapterConnector, SpawnSpec};
use crate::config::ServiceDefinition;
use crate::env::{EnvSource, resolve_env_references};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::store::{ServiceStatus, ServiceStore};

/// Starts adapters and records the outcome in the store.
///
/// The supervisor is the only component that creates clients.
pub struct ProcessSupervisor {
    store: Arc<ServiceStore>,
    connector: Arc<dyn AdapterConnector>,
    env: Arc<dyn EnvSource>,
    handshake_timeout: Duration,
    starting: Mutex<HashSet<String>>,
}

impl ProcessSupervisor {
    /// Create a supervisor.
    #[must_use]
    pub fn new(
        store: Arc<ServiceStore>,
        connector: Arc<dyn AdapterConnector>,
        env: Arc<dyn EnvSource>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            store,
            connector,
            env,
            handshake_timeout,
            starting: Mutex::new(HashSet::new()),
        }
    }

    /// Start the adapter `id`.
    ///
    /// Returns `Ok(true)` when a new client was attached and `Ok(false)` when
    /// the adapter was already active (or another start of it is in
    /// flight), in which case nothing is spawned.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::UnknownService`] for an unregistered id.
    /// - [`OrchestratorError::DependencyUnmet`] when a required environment
    ///   variable is missing; the status is left unchanged.
    /// - [`OrchestratorError::StartupFailed`] when spawn or handshake fails
    ///   or times out; the adapter is marked `Error`.
    /// - [`OrchestratorError::ShutDown`] when the store is closed, including
    ///   while the handshake was running; the new client is closed.
    pub async fn start(&self, id: &str) -> OrchestratorResult<bool> {
        if self.store.is_closed().await {
            return Err(OrchestratorError::ShutDown);
        }
        let snapshot = self
            .store
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::UnknownService { id: id.to_string() })?;

        if snapshot.status == ServiceStatus::Active {
            debug!(service = id, "Service already active");
            return Ok(false);
        }

        if let Some(variable) = snapshot.definition.unmet_dependency(self.env.as_ref()) {
            warn!(service = id, variable, "Dependency unmet; not starting");
            return Err(OrchestratorError::DependencyUnmet {
                id: id.to_string(),
                variable: variable.to_string(),
            });
        }

        let Some(_in_flight) = InFlight::acquire(&self.starting, id) else {
            debug!(service = id, "Start already in progress");
            return Ok(false);
        };
        // A start that finished between the first check and the guard.
        if self.store.status(id).await == Some(ServiceStatus::Active) {
            return Ok(false);
        }

        let spec = self.spawn_spec(&snapshot.definition);
        info!(service = id, command = %spec.command, "Starting service");

        match self.connect(&spec).await {
            Ok((client, tool_count)) => {
                let displaced = match self
                    .store
                    .set_status(id, ServiceStatus::Active, Some(Arc::clone(&client)))
                    .await
                {
                    Ok(displaced) => displaced,
                    Err(OrchestratorError::ShutDown) => {
                        info!(service = id, "Shut down during startup; closing new client");
                        self.discard(id, client).await;
                        return Err(OrchestratorError::ShutDown);
                    },
                    Err(e) => return Err(e),
                };
                if displaced.is_some() {
                    warn!(service = id, "Replaced a client that was still attached");
                }
                info!(service = id, tool_count, "Service active");
                Ok(true)
            },
            Err(e) => {
                let reason = match e {
                    OrchestratorError::StartupFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                if self.store.is_closed().await {
                    debug!(service = id, error = %reason, "Startup failed after shutdown");
                    return Err(OrchestratorError::ShutDown);
                }
                warn!(service = id, error = %reason, "Service failed to start");
                self.store.mark_error(id, reason.clone(), None).await?;
                Err(OrchestratorError::StartupFailed {
                    id: id.to_string(),
                    reason,
                })
            },
        }
    }

    /// Resolve `${VAR}` references in a definition's launch parameters.
    #[must_use]
    pub fn spawn_spec(&self, definition: &ServiceDefinition) -> SpawnSpec {
        let env = self.env.as_ref();
        SpawnSpec {
            id: definition.id.clone(),
            command: definition.command.clone(),
            args: definition
                .args
                .iter()
                .map(|a| resolve_env_references(a, env))
                .collect(),
            env: definition
                .env
                .iter()
                .map(|(k, v)| (k.clone(), resolve_env_references(v, env)))
                .collect(),
            cwd: definition.cwd.clone(),
        }
    }

    /// Close a client the store refused, bounded by the handshake timeout.
    async fn discard(&self, id: &str, client: Arc<dyn AdapterClient>) {
        match tokio::time::timeout(self.handshake_timeout, client.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!(service = id, error = %e, "Failed to close discarded client"),
            Err(_) => warn!(service = id, "Timed out closing discarded client"),
        }
    }

    /// Spawn plus handshake, bounded by the handshake timeout.
    async fn connect(&self, spec: &SpawnSpec) -> OrchestratorResult<(Arc<dyn AdapterClient>, usize)> {
        let handshake = async {
            let client = self.connector.connect(spec).await?;
            let tools = client.list_capabilities().await?;
            Ok::<_, OrchestratorError>((client, tools.len()))
        };

        tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| OrchestratorError::Timeout {
                id: spec.id.clone(),
                operation: "handshake",
            })?
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

/// Marks an id as being started; released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, id: &str) -> Option<Self> {
        let mut guard = set.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(id.to_string()).then(|| Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.set.lock() {
            guard.remove(&self.id);
        }
    }
}
