//! Mock adapter transport for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchboard_orchestrator::{
    AdapterClient, AdapterConnector, AdapterResponse, OrchestratorError, OrchestratorResult,
    SpawnSpec,
};

/// How a mock adapter answers calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CallBehaviour {
    /// Echo the params back as a structured result.
    #[default]
    Echo,
    /// Return a transport-level error.
    Fail(String),
    /// Return a result flagged `is_error`.
    ErrorResult(String),
    /// Never answer.
    Hang,
    /// Answer after a delay.
    Delay(Duration),
}

/// Scripted behaviour for one adapter id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterScript {
    /// Refuse to spawn.
    pub refuse_spawn: bool,
    /// Spawn, then never complete the handshake.
    pub hang_handshake: bool,
    /// Call behaviour.
    pub calls: CallBehaviour,
    /// Make `close` fail.
    pub fail_close: bool,
    /// Tools reported by the handshake.
    pub tools: Vec<String>,
}

impl AdapterScript {
    /// A healthy adapter that echoes calls.
    #[must_use]
    pub fn healthy() -> Self {
        Self::default()
    }

    /// An adapter whose spawn fails.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse_spawn: true,
            ..Self::default()
        }
    }

    /// Set the call behaviour.
    #[must_use]
    pub fn with_calls(mut self, calls: CallBehaviour) -> Self {
        self.calls = calls;
        self
    }
}

/// Shared control surface for one spawned mock adapter.
///
/// Holding it does not keep the client alive, so tests can observe whether
/// the orchestrator dropped it.
#[derive(Debug, Default)]
pub struct AdapterControl {
    killed: AtomicBool,
    stalled: AtomicBool,
    closed: AtomicBool,
    calls: AtomicUsize,
    probes: AtomicUsize,
    received: Mutex<Vec<(String, Value)>>,
}

impl AdapterControl {
    /// Simulate the subprocess dying: later probes and calls fail.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    /// Simulate a wedged subprocess: later probes and calls never answer.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Whether `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of handshake/probe requests received.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// `(method, params)` of every call received, in order.
    #[must_use]
    pub fn received(&self) -> Vec<(String, Value)> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Decrements a live-client counter when dropped.
#[derive(Debug)]
struct LiveToken(Arc<AtomicUsize>);

impl LiveToken {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A mock adapter client handed to the orchestrator.
#[derive(Debug)]
pub struct MockAdapter {
    id: String,
    script: AdapterScript,
    control: Arc<AdapterControl>,
    _live: LiveToken,
}

impl MockAdapter {
    fn dead(&self) -> OrchestratorError {
        OrchestratorError::ProtocolError(format!("{}: transport closed", self.id))
    }
}

#[async_trait]
impl AdapterClient for MockAdapter {
    async fn list_capabilities(&self) -> OrchestratorResult<Vec<String>> {
        self.control.probes.fetch_add(1, Ordering::SeqCst);
        if self.control.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.control.killed.load(Ordering::SeqCst) {
            return Err(self.dead());
        }
        Ok(self.script.tools.clone())
    }

    async fn call(&self, method: &str, params: Value) -> OrchestratorResult<AdapterResponse> {
        self.control.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.control.received.lock() {
            guard.push((method.to_string(), params.clone()));
        }
        if self.control.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.control.killed.load(Ordering::SeqCst) {
            return Err(self.dead());
        }

        match &self.script.calls {
            CallBehaviour::Echo => Ok(AdapterResponse::json(self.id.clone(), params)),
            CallBehaviour::Fail(reason) => Err(OrchestratorError::AdapterCallFailed {
                id: self.id.clone(),
                method: method.to_string(),
                reason: reason.clone(),
            }),
            CallBehaviour::ErrorResult(message) => {
                Ok(AdapterResponse::error(self.id.clone(), message.clone()))
            },
            CallBehaviour::Hang => std::future::pending().await,
            CallBehaviour::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(AdapterResponse::json(self.id.clone(), params))
            },
        }
    }

    async fn close(&self) -> OrchestratorResult<()> {
        self.control.closed.store(true, Ordering::SeqCst);
        if self.script.fail_close {
            return Err(OrchestratorError::ShutdownFailed {
                id: self.id.clone(),
                reason: "close refused".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    scripts: HashMap<String, AdapterScript>,
    spawned: Vec<SpawnSpec>,
    controls: HashMap<String, Vec<Arc<AdapterControl>>>,
    live: HashMap<String, Arc<AtomicUsize>>,
}

/// Mock implementation of [`AdapterConnector`].
///
/// Adapters without a script are healthy echo adapters. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Create a connector where every adapter is healthy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script adapter `id`.
    #[must_use]
    pub fn with_script(self, id: impl Into<String>, script: AdapterScript) -> Self {
        self.set_script(id, script);
        self
    }

    /// Make spawning `id` fail.
    #[must_use]
    pub fn refusing(self, id: impl Into<String>) -> Self {
        self.with_script(id, AdapterScript::refusing())
    }

    /// Replace the script for `id`; affects the next spawn only.
    pub fn set_script(&self, id: impl Into<String>, script: AdapterScript) {
        if let Ok(mut guard) = self.state.lock() {
            guard.scripts.insert(id.into(), script);
        }
    }

    /// How many times `id` was spawned.
    #[must_use]
    pub fn spawn_count(&self, id: &str) -> usize {
        self.state
            .lock()
            .map(|guard| guard.spawned.iter().filter(|s| s.id == id).count())
            .unwrap_or(0)
    }

    /// Every spawn, in order.
    #[must_use]
    pub fn spawned(&self) -> Vec<SpawnSpec> {
        self.state
            .lock()
            .map(|guard| guard.spawned.clone())
            .unwrap_or_default()
    }

    /// Control for the most recent spawn of `id`.
    #[must_use]
    pub fn control(&self, id: &str) -> Option<Arc<AdapterControl>> {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.controls.get(id).and_then(|c| c.last().cloned()))
    }

    /// Controls for every spawn of `id`, oldest first.
    #[must_use]
    pub fn controls(&self, id: &str) -> Vec<Arc<AdapterControl>> {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.controls.get(id).cloned())
            .unwrap_or_default()
    }

    /// Number of clients for `id` that are still alive somewhere.
    #[must_use]
    pub fn live_clients(&self, id: &str) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.live.get(id).map(|c| c.load(Ordering::SeqCst)))
            .unwrap_or(0)
    }
}

#[async_trait]
impl AdapterConnector for MockConnector {
    async fn connect(&self, spec: &SpawnSpec) -> OrchestratorResult<Arc<dyn AdapterClient>> {
        let (script, control, live) = {
            let mut guard = self
                .state
                .lock()
                .map_err(|e| OrchestratorError::ProtocolError(e.to_string()))?;
            guard.spawned.push(spec.clone());
            let script = guard.scripts.get(&spec.id).cloned().unwrap_or_default();
            if script.refuse_spawn {
                return Err(OrchestratorError::StartupFailed {
                    id: spec.id.clone(),
                    reason: format!("spawn {}: refused by script", spec.command),
                });
            }

            let control = Arc::new(AdapterControl::default());
            guard
                .controls
                .entry(spec.id.clone())
                .or_default()
                .push(Arc::clone(&control));
            let live = Arc::clone(guard.live.entry(spec.id.clone()).or_default());
            (script, control, live)
        };

        let adapter = MockAdapter {
            id: spec.id.clone(),
            _live: LiveToken::new(&live),
            script: script.clone(),
            control,
        };

        if script.hang_handshake {
            std::future::pending::<()>().await;
        }
        Ok(Arc::new(adapter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(id: &str) -> SpawnSpec {
        SpawnSpec {
            id: id.to_string(),
            command: format!("adapter-{id}"),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    #[tokio::test]
    async fn echo_and_counters() {
        let connector = MockConnector::new();
        let client = connector.connect(&spec("a")).await.unwrap();

        let response = client.call("get", serde_json::json!({"k": 1})).await.unwrap();
        assert_eq!(response.service, "a");
        assert_eq!(response.structured, Some(serde_json::json!({"k": 1})));

        let control = connector.control("a").unwrap();
        assert_eq!(control.call_count(), 1);
        assert_eq!(control.received()[0].0, "get");
        assert_eq!(connector.spawn_count("a"), 1);
    }

    #[tokio::test]
    async fn live_count_follows_drop() {
        let connector = MockConnector::new();
        let client = connector.connect(&spec("a")).await.unwrap();
        assert_eq!(connector.live_clients("a"), 1);

        drop(client);
        assert_eq!(connector.live_clients("a"), 0);
    }

    #[tokio::test]
    async fn killed_adapter_fails_probes() {
        let connector = MockConnector::new();
        let client = connector.connect(&spec("a")).await.unwrap();
        connector.control("a").unwrap().kill();

        assert!(client.list_capabilities().await.is_err());
        assert!(client.call("get", Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn refusing_script() {
        let connector = MockConnector::new().refusing("a");
        assert!(connector.connect(&spec("a")).await.is_err());
        assert_eq!(connector.spawn_count("a"), 1);
        assert!(connector.control("a").is_none());
    }
}
