//! `serve`: keep the adapters up until a termination signal arrives.

use anyhow::Result;
use colored::Colorize;
use switchboard_orchestrator::SwitchboardConfig;
use tracing::info;

use super::{boot, shut_down};
use crate::signal::wait_for_shutdown_signal;
use crate::theme::Theme;

/// Boot, supervise, and shut down on signal.
pub(crate) async fn run_serve(config: SwitchboardConfig) -> Result<()> {
    println!("{}", Theme::header("Switchboard"));
    println!("{}", Theme::separator());

    let orchestrator = boot(config, false).await?;

    let status = orchestrator.status().await?;
    info!(
        health = %status.health,
        active = status.coverage.active,
        total = status.coverage.total,
        "Orchestrator ready"
    );
    println!("{} {}", Theme::health(status.health), status.recommendation);

    let interval = orchestrator.settings().health_interval();
    println!(
        "{}",
        Theme::info(&format!(
            "Health checks every {}s; press Ctrl+C to stop",
            interval.as_secs()
        ))
    );

    let signal = wait_for_shutdown_signal().await?;
    info!(signal, "Shutdown requested");
    println!("\n{}", "Shutting down...".yellow());

    let report = shut_down(&orchestrator).await;
    println!(
        "{}",
        Theme::success(&format!("Closed {} adapter(s)", report.closed.len()))
    );
    Ok(())
}
