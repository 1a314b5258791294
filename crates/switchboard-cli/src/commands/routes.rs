//! `routes`: inspect the routing table without spawning anything.

use anyhow::Result;
use colored::Colorize;
use switchboard_orchestrator::{RoutingTable, ServiceDefinition, SwitchboardConfig};

use crate::theme::Theme;

/// Adapters whose launch command is not on `PATH`.
fn missing_commands(services: &[ServiceDefinition]) -> Vec<&ServiceDefinition> {
    services
        .iter()
        .filter(|def| which::which(&def.command).is_err())
        .collect()
}

/// Validate the configuration and print the derived routing table.
pub(crate) fn show_routes(config: &SwitchboardConfig) -> Result<()> {
    config.validate()?;
    let table = RoutingTable::derive(
        &config.services,
        &config.routes,
        config.orchestrator.default_route(),
    );

    println!("{}", Theme::header("Routes"));
    for (capability, targets) in table.entries() {
        println!("  {:<12} {}", capability.bold(), targets.join(" → "));
    }
    match table.default_route() {
        Some(route) => println!("  {:<12} {}", "(default)".dimmed(), route),
        None => println!("  {}", Theme::dimmed("no default route")),
    }

    println!("\n{}", Theme::header("Critical"));
    let critical = config.critical_ids();
    if critical.is_empty() {
        println!("  {}", Theme::dimmed("none"));
    } else {
        println!("  {}", critical.join(", "));
    }

    let missing = missing_commands(&config.services);
    if !missing.is_empty() {
        println!();
        for def in missing {
            println!(
                "{}",
                Theme::warning(&format!("{}: command {} not found on PATH", def.id, def.command))
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolvable_commands_are_flagged() {
        let services = vec![ServiceDefinition::new(
            "ghost",
            "switchboard-test-no-such-binary",
        )];
        let missing = missing_commands(&services);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "ghost");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = SwitchboardConfig::builtin();
        config.add_route("web", ["ghost"]);
        assert!(show_routes(&config).is_err());
    }
}
