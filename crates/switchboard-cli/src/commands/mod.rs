//! CLI command implementations.

pub(crate) mod call;
pub(crate) mod routes;
pub(crate) mod serve;
pub(crate) mod status;

use anyhow::Result;
use switchboard_orchestrator::{InitReport, Orchestrator, ShutdownReport, SwitchboardConfig};

use crate::theme::Theme;

/// Build a stdio orchestrator and start its critical adapters.
pub(crate) async fn boot(config: SwitchboardConfig, quiet: bool) -> Result<Orchestrator> {
    let orchestrator = Orchestrator::with_stdio(config)?;
    let report = orchestrator.initialize().await?;
    if !quiet {
        print_init_report(&report);
    }
    Ok(orchestrator)
}

/// Print which critical adapters came up.
pub(crate) fn print_init_report(report: &InitReport) {
    for id in report.started.iter().chain(&report.already_active) {
        println!("{}", Theme::success(&format!("{id} started")));
    }
    for failure in &report.failed {
        println!(
            "{}",
            Theme::error(&format!("{} failed: {}", failure.id, failure.error))
        );
    }
    if !report.is_complete() {
        println!(
            "{}",
            Theme::warning("Running with partial availability; failed adapters stay down")
        );
    }
}

/// Shut down and report close failures on stderr.
pub(crate) async fn shut_down(orchestrator: &Orchestrator) -> ShutdownReport {
    let report = orchestrator.shutdown().await;
    for failure in &report.failures {
        eprintln!("{}", Theme::warning(&failure.to_string()));
    }
    report
}
