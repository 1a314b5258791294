//! Switchboard Orchestrator - capability-based supervision of MCP adapters.
//!
//! This crate provides:
//! - A definition store tracking every adapter's status and live client
//! - A process supervisor that spawns adapters and completes the MCP handshake
//! - A health monitor that probes active adapters and restarts critical ones
//! - A capability router with ordered fallback across candidate adapters
//! - The [`Orchestrator`] lifecycle manager tying them together
//!
//! # Architecture
//!
//! Adapters are external subprocesses speaking MCP over stdio (via `rmcp`).
//! Callers never address an adapter directly: they ask for a capability
//! (`"web"`, `"database"`), and the router tries every adapter mapped to it
//! in priority order until one answers.
//!
//! # Example
//!
//! ```rust,no_run
//! use switchboard_orchestrator::{Orchestrator, SwitchboardConfig};
//!
//! # async fn example() -> Result<(), switchboard_orchestrator::OrchestratorError> {
//! let orchestrator = Orchestrator::with_stdio(SwitchboardConfig::builtin())?;
//! let report = orchestrator.initialize().await?;
//! println!("started: {:?}", report.started);
//!
//! let response = orchestrator
//!     .execute("web", "fetch", serde_json::json!({"url": "https://example.com"}))
//!     .await?;
//! println!("{} answered: {}", response.service, response.text_content());
//!
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod adapter;
mod config;
mod env;
mod error;
mod health;
mod orchestrator;
mod router;
mod routing;
mod status;
mod store;
mod supervisor;
mod types;

#[cfg(test)]
mod test_support;

pub use adapter::{AdapterClient, AdapterConnector, SpawnSpec, StdioAdapter, StdioConnector};
pub use config::{
    CONFIG_FILE_NAME, DEFAULT_ROUTE, HOME_ENV, LoggingConfig, OrchestratorSettings,
    ServiceDefinition, SwitchboardConfig,
};
pub use env::{EnvSource, ProcessEnv, StaticEnv, is_blocked_spawn_env, resolve_env_references};
pub use error::{OrchestratorError, OrchestratorResult};
pub use health::{HealthMonitor, MonitorHandle, SweepReport};
pub use orchestrator::{InitReport, Orchestrator, ShutdownReport, StartFailure};
pub use router::CapabilityRouter;
pub use routing::RoutingTable;
pub use status::{Coverage, HealthState, OrchestratorStatus, ServiceReport};
pub use store::{ClientLease, ServiceSnapshot, ServiceStatus, ServiceStore};
pub use supervisor::ProcessSupervisor;
pub use types::{AdapterResponse, ContentBlock, tool_arguments};
