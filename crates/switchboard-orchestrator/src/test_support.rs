//! Minimal in-crate fakes for unit tests. Scenario tests use the richer
//! mocks in `switchboard-test`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::adapter::{AdapterClient, AdapterConnector, SpawnSpec};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::types::AdapterResponse;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    Healthy,
    RefuseSpawn,
    Hang,
    FailCalls,
}

pub(crate) struct FakeClient {
    id: String,
    behaviour: Behaviour,
    dead: AtomicBool,
    pub(crate) calls: AtomicUsize,
    pub(crate) closed: AtomicBool,
}

impl FakeClient {
    pub(crate) fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AdapterClient for FakeClient {
    async fn list_capabilities(&self) -> OrchestratorResult<Vec<String>> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(OrchestratorError::ProtocolError("connection closed".into()));
        }
        Ok(vec!["echo".to_string()])
    }

    async fn call(&self, method: &str, params: Value) -> OrchestratorResult<AdapterResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Hang => std::future::pending().await,
            Behaviour::FailCalls => Err(OrchestratorError::AdapterCallFailed {
                id: self.id.clone(),
                method: method.to_string(),
                reason: "boom".into(),
            }),
            _ => Ok(AdapterResponse::json(self.id.clone(), params)),
        }
    }

    async fn close(&self) -> OrchestratorResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector whose adapters behave according to a per-id script.
#[derive(Default)]
pub(crate) struct FakeConnector {
    script: Mutex<HashMap<String, Behaviour>>,
    pub(crate) spawned: Mutex<Vec<SpawnSpec>>,
    clients: Mutex<HashMap<String, Arc<FakeClient>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl FakeConnector {
    pub(crate) fn with(self, id: &str, behaviour: Behaviour) -> Self {
        self.script.lock().unwrap().insert(id.to_string(), behaviour);
        self
    }

    pub(crate) fn set(&self, id: &str, behaviour: Behaviour) {
        self.script.lock().unwrap().insert(id.to_string(), behaviour);
    }

    /// Hold `connect` for `id` after spawning until the gate is notified.
    pub(crate) fn gate(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(id.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn spawn_count(&self, id: &str) -> usize {
        self.spawned.lock().unwrap().iter().filter(|s| s.id == id).count()
    }

    pub(crate) fn last_client(&self, id: &str) -> Arc<FakeClient> {
        Arc::clone(&self.clients.lock().unwrap()[id])
    }
}

#[async_trait]
impl AdapterConnector for FakeConnector {
    async fn connect(&self, spec: &SpawnSpec) -> OrchestratorResult<Arc<dyn AdapterClient>> {
        self.spawned.lock().unwrap().push(spec.clone());
        let behaviour = self
            .script
            .lock()
            .unwrap()
            .get(&spec.id)
            .copied()
            .unwrap_or(Behaviour::Healthy);

        match behaviour {
            Behaviour::RefuseSpawn => Err(OrchestratorError::StartupFailed {
                id: spec.id.clone(),
                reason: "spawn refused".into(),
            }),
            Behaviour::Hang if spec.command == "hang-on-spawn" => std::future::pending().await,
            _ => {
                let client = Arc::new(FakeClient {
                    id: spec.id.clone(),
                    behaviour,
                    dead: AtomicBool::new(false),
                    calls: AtomicUsize::new(0),
                    closed: AtomicBool::new(false),
                });
                self.clients
                    .lock()
                    .unwrap()
                    .insert(spec.id.clone(), Arc::clone(&client));
                let gate = self.gates.lock().unwrap().get(&spec.id).cloned();
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok(client)
            },
        }
    }
}
