//! `status`: boot the critical set and print a health report.

use anyhow::Result;
use colored::Colorize;
use switchboard_orchestrator::{OrchestratorStatus, SwitchboardConfig};

use super::{boot, shut_down};
use crate::theme::Theme;

/// Print the orchestrator status after initialization.
pub(crate) async fn run_status(config: SwitchboardConfig, json: bool) -> Result<()> {
    let orchestrator = boot(config, json).await?;
    let status = orchestrator.status().await;
    shut_down(&orchestrator).await;
    let status = status?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &OrchestratorStatus) {
    println!("\n{}", Theme::header("Adapters"));
    for service in &status.services {
        let marker = if service.critical { "*" } else { " " };
        println!(
            "  {marker} {:<12} {:<10} {}",
            service.id,
            Theme::status(service.status),
            service.capabilities.join(", ").dimmed()
        );
        if let Some(error) = &service.last_error {
            println!("      {}", Theme::dimmed(error));
        }
    }

    let c = &status.coverage;
    println!("\n{}", Theme::header("Coverage"));
    println!("  Active: {}/{}", c.active.to_string().yellow(), c.total);
    println!(
        "  Critical: {}/{}",
        c.critical_active.to_string().yellow(),
        c.critical_total
    );
    println!(
        "  Capabilities routable: {}/{} ({}%)",
        c.capabilities_routable.to_string().yellow(),
        c.capabilities_total,
        c.capability_percent()
    );

    println!();
    println!("  Health: {}", Theme::health(status.health));
    println!("  {}", status.recommendation);
    println!(
        "  {}",
        Theme::dimmed(&status.checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    );
}
