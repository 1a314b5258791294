//! Service definition store.
//!
//! Holds every registered adapter in registration order together with its
//! runtime status and, while active, its client. Every mutation goes through
//! one transition function, which enforces:
//!
//! - `Active` if and only if a client is attached;
//! - at most one client per id (attaching a new one displaces the old);
//! - nothing becomes `Active` once the store is closed.
//!
//! No lock is held across adapter I/O: callers borrow a [`ClientLease`] for a
//! single call and drop it afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::adapter::AdapterClient;
use crate::config::ServiceDefinition;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Runtime status of one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Registered, not started (or explicitly stopped).
    #[default]
    Inactive,
    /// Connected and presumed healthy.
    Active,
    /// Failed to start or failed a probe.
    Error,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Active => write!(f, "active"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A client borrowed for one call.
#[derive(Clone)]
pub struct ClientLease {
    /// The adapter client.
    pub client: Arc<dyn AdapterClient>,
    /// Attachment generation of this client; changes on every restart.
    pub generation: u64,
}

impl std::fmt::Debug for ClientLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLease")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    /// Registered definition.
    pub definition: Arc<ServiceDefinition>,
    /// Current status.
    pub status: ServiceStatus,
    /// Whether a client is attached.
    pub has_client: bool,
    /// Attachment generation (0 until the first successful start).
    pub generation: u64,
    /// Reason for the most recent failure.
    pub last_error: Option<String>,
    /// When the status last changed.
    pub changed_at: DateTime<Utc>,
}

impl ServiceSnapshot {
    /// Adapter id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

struct ServiceEntry {
    definition: Arc<ServiceDefinition>,
    status: ServiceStatus,
    client: Option<Arc<dyn AdapterClient>>,
    generation: u64,
    last_error: Option<String>,
    changed_at: DateTime<Utc>,
}

impl ServiceEntry {
    fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            definition: Arc::clone(&self.definition),
            status: self.status,
            has_client: self.client.is_some(),
            generation: self.generation,
            last_error: self.last_error.clone(),
            changed_at: self.changed_at,
        }
    }
}

#[derive(Default)]
struct Entries {
    ordered: Vec<ServiceEntry>,
    index: HashMap<String, usize>,
    closed: bool,
}

impl Entries {
    fn insert(&mut self, definition: ServiceDefinition) -> bool {
        if self.index.contains_key(&definition.id) {
            warn!(service = %definition.id, "Service already registered; ignoring");
            return false;
        }

        self.index.insert(definition.id.clone(), self.ordered.len());
        self.ordered.push(ServiceEntry {
            definition: Arc::new(definition),
            status: ServiceStatus::Inactive,
            client: None,
            generation: 0,
            last_error: None,
            changed_at: Utc::now(),
        });
        true
    }

    fn get_mut(&mut self, id: &str) -> OrchestratorResult<&mut ServiceEntry> {
        self.index
            .get(id)
            .and_then(|&i| self.ordered.get_mut(i))
            .ok_or_else(|| OrchestratorError::UnknownService { id: id.to_string() })
    }
}

/// What a transition should do to the entry.
struct Transition {
    status: ServiceStatus,
    client: Option<Arc<dyn AdapterClient>>,
    reason: Option<String>,
    only_generation: Option<u64>,
}

/// The `id → definition + status + client` map.
#[derive(Default)]
pub struct ServiceStore {
    entries: RwLock<Entries>,
}

impl ServiceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `definitions`, all `Inactive`.
    ///
    /// Duplicate ids keep the first definition.
    #[must_use]
    pub fn with_definitions(definitions: impl IntoIterator<Item = ServiceDefinition>) -> Self {
        let mut entries = Entries::default();
        for definition in definitions {
            entries.insert(definition);
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Register a definition as `Inactive`.
    ///
    /// Returns `false` (and logs) if the id is already registered.
    pub async fn register(&self, definition: ServiceDefinition) -> bool {
        self.entries.write().await.insert(definition)
    }

    /// Snapshot one entry.
    pub async fn get(&self, id: &str) -> Option<ServiceSnapshot> {
        let entries = self.entries.read().await;
        entries
            .index
            .get(id)
            .and_then(|&i| entries.ordered.get(i))
            .map(ServiceEntry::snapshot)
    }

    /// Current status of one entry.
    pub async fn status(&self, id: &str) -> Option<ServiceStatus> {
        self.get(id).await.map(|s| s.status)
    }

    /// Snapshot every entry, in registration order.
    ///
    /// Each call reflects the latest state; iterate it as often as needed.
    pub async fn all(&self) -> Vec<ServiceSnapshot> {
        let entries = self.entries.read().await;
        entries.ordered.iter().map(ServiceEntry::snapshot).collect()
    }

    /// Registered ids, in registration order.
    pub async fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.ordered.iter().map(|e| e.definition.id.clone()).collect()
    }

    /// Number of registered adapters.
    pub async fn len(&self) -> usize {
        self.entries.read().await.ordered.len()
    }

    /// Whether nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Borrow the client of an active adapter for one call.
    pub async fn client(&self, id: &str) -> Option<ClientLease> {
        let entries = self.entries.read().await;
        let entry = entries.index.get(id).and_then(|&i| entries.ordered.get(i))?;
        match (&entry.status, &entry.client) {
            (ServiceStatus::Active, Some(client)) => Some(ClientLease {
                client: Arc::clone(client),
                generation: entry.generation,
            }),
            _ => None,
        }
    }

    /// Close the store: detach every client and refuse later activations.
    ///
    /// Every adapter that held a client becomes `Inactive`; the detached
    /// clients are returned for the caller to close. A start that finishes
    /// afterwards gets [`OrchestratorError::ShutDown`] instead of attaching.
    /// Closing twice returns nothing the second time.
    pub async fn close(&self) -> Vec<(String, Arc<dyn AdapterClient>)> {
        let mut entries = self.entries.write().await;
        entries.closed = true;

        let now = Utc::now();
        let mut detached = Vec::new();
        for entry in &mut entries.ordered {
            if let Some(client) = entry.client.take() {
                debug!(service = %entry.definition.id, from = %entry.status, "Detached on close");
                entry.status = ServiceStatus::Inactive;
                entry.changed_at = now;
                detached.push((entry.definition.id.clone(), client));
            }
        }
        detached
    }

    /// Whether [`Self::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.entries.read().await.closed
    }

    /// Transition `id` to `status`, attaching `client` when activating.
    ///
    /// `Active` requires a client and every other status requires none.
    /// Returns the displaced client, if any; the caller decides whether to
    /// close it or let it drop.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownService`] for an unregistered id,
    /// a configuration error if status and client disagree, or
    /// [`OrchestratorError::ShutDown`] when activating a closed store. The
    /// rejected client is dropped.
    pub async fn set_status(
        &self,
        id: &str,
        status: ServiceStatus,
        client: Option<Arc<dyn AdapterClient>>,
    ) -> OrchestratorResult<Option<Arc<dyn AdapterClient>>> {
        self.transition(
            id,
            Transition {
                status,
                client,
                reason: None,
                only_generation: None,
            },
        )
        .await
        .map(|(displaced, _)| displaced)
    }

    /// Mark `id` as `Error`, recording `reason` and discarding its client.
    ///
    /// With `generation`, the change only applies while that client is
    /// still attached, so a failure observed on an old connection never
    /// clobbers a restart that already happened. Returns whether the entry
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownService`] for an unregistered id.
    pub async fn mark_error(
        &self,
        id: &str,
        reason: impl Into<String>,
        generation: Option<u64>,
    ) -> OrchestratorResult<bool> {
        let (displaced, applied) = self
            .transition(
                id,
                Transition {
                    status: ServiceStatus::Error,
                    client: None,
                    reason: Some(reason.into()),
                    only_generation: generation,
                },
            )
            .await?;
        // The subprocess is reaped when the last handle drops.
        drop(displaced);
        Ok(applied)
    }

    async fn transition(
        &self,
        id: &str,
        change: Transition,
    ) -> OrchestratorResult<(Option<Arc<dyn AdapterClient>>, bool)> {
        match (change.status, change.client.is_some()) {
            (ServiceStatus::Active, false) => {
                return Err(OrchestratorError::ConfigError(format!(
                    "cannot mark {id} active without a client"
                )));
            },
            (ServiceStatus::Inactive | ServiceStatus::Error, true) => {
                return Err(OrchestratorError::ConfigError(format!(
                    "cannot attach a client to {id} while {}",
                    change.status
                )));
            },
            _ => {},
        }

        let mut entries = self.entries.write().await;
        if entries.closed && change.status == ServiceStatus::Active {
            debug!(service = id, "Store closed; activation refused");
            return Err(OrchestratorError::ShutDown);
        }
        let entry = entries.get_mut(id)?;

        if let Some(expected) = change.only_generation
            && (entry.generation != expected || entry.client.is_none())
        {
            debug!(service = id, expected, current = entry.generation, "Stale transition ignored");
            return Ok((None, false));
        }

        let previous = entry.status;
        let displaced = entry.client.take();
        if let Some(client) = change.client {
            entry.generation = entry.generation.saturating_add(1);
            entry.client = Some(client);
            entry.last_error = None;
        }
        if change.reason.is_some() {
            entry.last_error = change.reason;
        }
        entry.status = change.status;
        entry.changed_at = Utc::now();

        debug!(service = id, from = %previous, to = %entry.status, "Status transition");
        Ok((displaced, true))
    }
}

impl std::fmt::Debug for ServiceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStore").finish_non_exhaustive()
    }
}
