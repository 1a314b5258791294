//! Orchestrator error types.

use thiserror::Error;

/// Errors surfaced by the orchestrator.
///
/// Per-adapter failures (spawn, probe, a single fallback candidate) are
/// absorbed into status changes and log lines; callers only ever see the
/// terminal outcome of `start`, `execute`, or a configuration problem.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The adapter id is not registered.
    #[error("Unknown service: {id}")]
    UnknownService {
        /// The requested adapter id.
        id: String,
    },

    /// A required environment variable is missing or empty.
    #[error("Dependency unmet for {id}: environment variable {variable} is not set")]
    DependencyUnmet {
        /// The adapter id.
        id: String,
        /// The missing variable.
        variable: String,
    },

    /// Spawning the subprocess or completing the handshake failed.
    #[error("Failed to start service {id}: {reason}")]
    StartupFailed {
        /// The adapter id.
        id: String,
        /// Underlying cause.
        reason: String,
    },

    /// A liveness probe failed on a previously active adapter.
    #[error("Health probe failed for {id}: {reason}")]
    ProbeFailed {
        /// The adapter id.
        id: String,
        /// Underlying cause.
        reason: String,
    },

    /// Every candidate for a capability was inactive or failed.
    #[error("No service available for capability: {capability}")]
    NoServiceAvailable {
        /// The requested capability.
        capability: String,
    },

    /// Closing an adapter connection failed during shutdown.
    #[error("Failed to close service {id}: {reason}")]
    ShutdownFailed {
        /// The adapter id.
        id: String,
        /// Underlying cause.
        reason: String,
    },

    /// An adapter call returned an error or an error-flagged result.
    #[error("Call failed: {id}:{method} - {reason}")]
    AdapterCallFailed {
        /// The adapter id.
        id: String,
        /// The invoked method.
        method: String,
        /// Underlying cause.
        reason: String,
    },

    /// The adapter is registered but has no live connection.
    #[error("Service not active: {id}")]
    ServiceNotActive {
        /// The adapter id.
        id: String,
    },

    /// An adapter operation exceeded its time budget.
    #[error("{operation} timed out for service {id}")]
    Timeout {
        /// The adapter id.
        id: String,
        /// Which operation (handshake, probe, call, close).
        operation: &'static str,
    },

    /// The orchestrator has been shut down.
    #[error("Orchestrator has been shut down")]
    ShutDown,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// MCP protocol error from rmcp.
    #[error("MCP protocol error: {0}")]
    ProtocolError(String),
}

impl OrchestratorError {
    /// Whether this error came from a single adapter rather than from the
    /// orchestrator as a whole.
    #[must_use]
    pub fn is_adapter_local(&self) -> bool {
        matches!(
            self,
            Self::StartupFailed { .. }
                | Self::ProbeFailed { .. }
                | Self::AdapterCallFailed { .. }
                | Self::Timeout { .. }
                | Self::ProtocolError(_)
                | Self::IoError(_)
        )
    }
}

impl From<rmcp::ServiceError> for OrchestratorError {
    fn from(err: rmcp::ServiceError) -> Self {
        Self::ProtocolError(err.to_string())
    }
}

impl From<rmcp::service::ClientInitializeError> for OrchestratorError {
    fn from(err: rmcp::service::ClientInitializeError) -> Self {
        Self::ProtocolError(format!("initialization failed: {err}"))
    }
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
