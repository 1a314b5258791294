//! Prelude module - commonly used types for convenient import.
//!
//! Use `use switchboard_orchestrator::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust,no_run
//! use switchboard_orchestrator::prelude::*;
//!
//! # async fn example() -> OrchestratorResult<()> {
//! let mut config = SwitchboardConfig::default();
//! config.add(
//!     ServiceDefinition::new("fetch", "uvx")
//!         .with_args(["mcp-server-fetch"])
//!         .with_capabilities(["web", "http"])
//!         .critical(),
//! );
//!
//! let orchestrator = Orchestrator::with_stdio(config)?;
//! orchestrator.initialize().await?;
//! let status = orchestrator.status().await?;
//! println!("{}: {}", status.health, status.recommendation);
//! # Ok(())
//! # }
//! ```

// Errors
pub use crate::{OrchestratorError, OrchestratorResult};

// Lifecycle
pub use crate::{InitReport, Orchestrator, ShutdownReport};

// Configuration
pub use crate::{ServiceDefinition, SwitchboardConfig};

// Adapters
pub use crate::{AdapterClient, AdapterConnector, AdapterResponse, SpawnSpec};

// Status
pub use crate::{HealthState, OrchestratorStatus, ServiceStatus};
