//! Switchboard Telemetry - logging setup for the service orchestrator.
//!
//! This crate provides:
//! - A serializable [`LogConfig`] (level, format, target, rotation)
//! - [`setup_logging`] which installs a global `tracing` subscriber
//!
//! # Example
//!
//! ```rust,no_run
//! use switchboard_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), switchboard_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("switchboard_orchestrator=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
