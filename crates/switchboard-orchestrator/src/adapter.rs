//! Adapter transport: the client seam and its stdio MCP implementation.
//!
//! An adapter is any subprocess that speaks MCP over its standard input and
//! output and answers `tools/list`. The orchestrator only needs three things
//! from it: a handshake it can repeat as a liveness probe, a call, and a
//! close. [`AdapterConnector`] is the only way a client comes into being.

use async_trait::async_trait;
use rmcp::ServiceExt;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::types::{AdapterResponse, tool_arguments};

/// A live connection to one adapter.
#[async_trait]
pub trait AdapterClient: Send + Sync {
    /// List the adapter's tools. Used as the startup handshake and as the
    /// liveness probe.
    async fn list_capabilities(&self) -> OrchestratorResult<Vec<String>>;

    /// Invoke `method` with `params`.
    async fn call(&self, method: &str, params: Value) -> OrchestratorResult<AdapterResponse>;

    /// Close the session and reap the subprocess.
    async fn close(&self) -> OrchestratorResult<()>;
}

/// Fully resolved launch parameters for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    /// Adapter id.
    pub id: String,
    /// Program.
    pub command: String,
    /// Arguments, with `${VAR}` references already resolved.
    pub args: Vec<String>,
    /// Extra environment, with `${VAR}` references already resolved.
    pub env: BTreeMap<String, String>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
}

/// Creates adapter clients.
#[async_trait]
pub trait AdapterConnector: Send + Sync {
    /// Launch the adapter described by `spec` and complete the protocol
    /// handshake.
    async fn connect(&self, spec: &SpawnSpec) -> OrchestratorResult<Arc<dyn AdapterClient>>;
}

type McpService = RunningService<RoleClient, ()>;

/// Launches adapters as child processes and talks MCP over stdio.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    close_timeout: Duration,
}

impl StdioConnector {
    /// Create a connector whose sessions close within `close_timeout`.
    #[must_use]
    pub fn new(close_timeout: Duration) -> Self {
        Self { close_timeout }
    }
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl AdapterConnector for StdioConnector {
    async fn connect(&self, spec: &SpawnSpec) -> OrchestratorResult<Arc<dyn AdapterClient>> {
        let mut cmd = tokio::process::Command::new(&spec.command);
        cmd.args(&spec.args).envs(&spec.env);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let transport = TokioChildProcess::new(cmd).map_err(|e| OrchestratorError::StartupFailed {
            id: spec.id.clone(),
            reason: format!("spawn {}: {e}", spec.command),
        })?;

        let service = ().serve(transport).await.map_err(|e| {
            OrchestratorError::StartupFailed {
                id: spec.id.clone(),
                reason: format!("MCP handshake failed: {e}"),
            }
        })?;

        if let Some(info) = service.peer_info() {
            debug!(
                service = %spec.id,
                server = %info.server_info.name,
                version = %info.server_info.version,
                "Adapter initialized"
            );
        }

        Ok(Arc::new(StdioAdapter {
            id: spec.id.clone(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            close_timeout: self.close_timeout,
        }))
    }
}

/// An MCP session with a child process.
///
/// Dropping it without [`AdapterClient::close`] still cancels the session,
/// and the child-process transport kills the subprocess.
pub struct StdioAdapter {
    id: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<McpService>>,
    close_timeout: Duration,
}

impl StdioAdapter {
    async fn is_closed(&self) -> bool {
        self.service
            .lock()
            .await
            .as_ref()
            .is_none_or(RunningService::is_closed)
    }
}

#[async_trait]
impl AdapterClient for StdioAdapter {
    async fn list_capabilities(&self) -> OrchestratorResult<Vec<String>> {
        if self.is_closed().await {
            return Err(OrchestratorError::ServiceNotActive {
                id: self.id.clone(),
            });
        }

        let tools = self.peer.list_all_tools().await?;
        Ok(tools.iter().map(|t| t.name.to_string()).collect())
    }

    async fn call(&self, method: &str, params: Value) -> OrchestratorResult<AdapterResponse> {
        let params = CallToolRequestParams {
            meta: None,
            name: Cow::Owned(method.to_string()),
            arguments: tool_arguments(params),
            task: None,
        };

        let result = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| OrchestratorError::AdapterCallFailed {
                id: self.id.clone(),
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        Ok(AdapterResponse::from_rmcp(&self.id, result))
    }

    async fn close(&self) -> OrchestratorResult<()> {
        let Some(mut service) = self.service.lock().await.take() else {
            return Ok(());
        };

        match service.close_with_timeout(self.close_timeout).await {
            Ok(Some(reason)) => {
                info!(service = %self.id, ?reason, "Adapter session closed");
                Ok(())
            },
            Ok(None) => Err(OrchestratorError::Timeout {
                id: self.id.clone(),
                operation: "close",
            }),
            Err(e) => Err(OrchestratorError::ShutdownFailed {
                id: self.id.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for StdioAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioAdapter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
