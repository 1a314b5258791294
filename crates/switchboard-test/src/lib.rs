//! Switchboard Test - Shared test utilities for the service orchestrator.
//!
//! This crate provides scripted mock adapters and configuration fixtures
//! that let scenario tests drive the orchestrator without spawning real
//! subprocesses.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! switchboard-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchboard_orchestrator::{Orchestrator, StaticEnv};
//! use switchboard_test::{MockConnector, store_scenario_config};
//!
//! #[tokio::test]
//! async fn routes_to_primary() {
//!     let connector = MockConnector::new();
//!     let orchestrator = Orchestrator::with_env(
//!         store_scenario_config(),
//!         Arc::new(connector.clone()),
//!         Arc::new(StaticEnv::new()),
//!     )
//!     .unwrap();
//!
//!     orchestrator.initialize().await.unwrap();
//!     let response = orchestrator
//!         .execute("store", "get", serde_json::json!({"k": 1}))
//!         .await
//!         .unwrap();
//!     assert_eq!(response.service, "A");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
