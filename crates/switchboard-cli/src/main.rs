//! Switchboard CLI - capability-based service orchestrator
//!
//! Boots the configured adapter subprocesses, routes capability requests
//! through them, and reports on their health.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use switchboard_orchestrator::{ProcessEnv, SwitchboardConfig};

mod commands;
mod config_bridge;
mod signal;
mod theme;

use commands::{call, routes, serve, status};

/// Switchboard - capability-based service orchestrator
#[derive(Parser)]
#[command(name = "switchboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: compact, pretty, json, or full
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start critical adapters and run until interrupted
    Serve,

    /// Start critical adapters and print a status report
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Route one request through the adapters offering a capability
    Call {
        /// Capability to request
        capability: String,
        /// Method to invoke on the adapter
        method: String,
        /// JSON parameters
        #[arg(short, long, default_value = "{}")]
        params: String,
        /// Also start this adapter before routing (repeatable)
        #[arg(long = "start")]
        start: Vec<String>,
    },

    /// Show the routing table without starting anything
    Routes,
}

/// Load the configuration file named on the command line, or the default one,
/// then apply environment overrides.
fn load_config(path: Option<&Path>) -> Result<SwitchboardConfig> {
    let env = ProcessEnv;
    let mut config = match path {
        Some(path) => SwitchboardConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SwitchboardConfig::load_default(&env)?,
    };
    config.apply_env_overrides(&env)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    // Set up logging from config, with flag overrides.
    let log_config =
        config_bridge::to_log_config(&config.logging, cli.verbose, cli.log_format.as_deref())?;
    if let Err(e) = switchboard_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Serve => serve::run_serve(config).await?,
        Commands::Status { json } => status::run_status(config, json).await?,
        Commands::Call {
            capability,
            method,
            params,
            start,
        } => call::run_call(config, &capability, &method, &params, &start).await?,
        Commands::Routes => routes::show_routes(&config)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn call_arguments_parse() {
        let cli = Cli::parse_from([
            "switchboard",
            "call",
            "database",
            "query",
            "--params",
            r#"{"sql":"select 1"}"#,
            "--start",
            "postgres",
        ]);
        match cli.command {
            Commands::Call {
                capability,
                method,
                params,
                start,
            } => {
                assert_eq!(capability, "database");
                assert_eq!(method, "query");
                assert_eq!(params, r#"{"sql":"select 1"}"#);
                assert_eq!(start, vec!["postgres"]);
            },
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchboard.toml");
        std::fs::write(
            &path,
            "[[services]]\nid = \"fetch\"\ncommand = \"uvx\"\ncapabilities = [\"web\"]\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].id, "fetch");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
