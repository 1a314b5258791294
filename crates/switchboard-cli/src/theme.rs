//! CLI theme and styling.

use colored::Colorize;
use switchboard_orchestrator::{HealthState, ServiceStatus};

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format an adapter status.
    pub(crate) fn status(status: ServiceStatus) -> String {
        let label = status.to_string();
        match status {
            ServiceStatus::Active => label.green().to_string(),
            ServiceStatus::Inactive => label.dimmed().to_string(),
            ServiceStatus::Error => label.red().to_string(),
        }
    }

    /// Format an aggregate health state.
    pub(crate) fn health(state: HealthState) -> String {
        let label = state.to_string();
        match state {
            HealthState::Healthy => label.green().bold().to_string(),
            HealthState::Degraded => label.yellow().bold().to_string(),
            HealthState::Unhealthy => label.red().bold().to_string(),
            HealthState::Unknown => label.dimmed().to_string(),
        }
    }
}
