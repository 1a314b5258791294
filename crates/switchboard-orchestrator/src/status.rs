//! Status reporting.
//!
//! Reporting only: nothing here feeds back into routing or supervision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::routing::RoutingTable;
use crate::store::{ServiceSnapshot, ServiceStatus};

/// Overall health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Every critical adapter is active and nothing is in error.
    Healthy,
    /// Some critical adapters are down, or some adapter is in error.
    Degraded,
    /// No critical adapter is active.
    Unhealthy,
    /// Nothing is registered.
    Unknown,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One adapter's row in the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReport {
    /// Adapter id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current status.
    pub status: ServiceStatus,
    /// Claimed capabilities.
    pub capabilities: Vec<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the adapter is in the critical set.
    pub critical: bool,
    /// Most recent failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&ServiceSnapshot> for ServiceReport {
    fn from(snapshot: &ServiceSnapshot) -> Self {
        let def = &snapshot.definition;
        Self {
            id: def.id.clone(),
            name: def.name().to_string(),
            status: snapshot.status,
            capabilities: def.capabilities.clone(),
            description: def.description.clone(),
            critical: def.critical,
            last_error: snapshot.last_error.clone(),
        }
    }
}

/// Coarse availability counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Active adapters.
    pub active: usize,
    /// Registered adapters.
    pub total: usize,
    /// Active critical adapters.
    pub critical_active: usize,
    /// Critical adapters.
    pub critical_total: usize,
    /// Mapped capabilities with at least one active candidate.
    pub capabilities_routable: usize,
    /// Mapped capabilities.
    pub capabilities_total: usize,
}

impl Coverage {
    /// Share of mapped capabilities that are routable, in percent.
    #[must_use]
    pub fn capability_percent(&self) -> usize {
        self.capabilities_routable
            .checked_mul(100)
            .and_then(|n| n.checked_div(self.capabilities_total))
            .unwrap_or(0)
    }
}

/// Snapshot of the whole orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Every adapter, in registration order.
    pub services: Vec<ServiceReport>,
    /// Availability counts.
    pub coverage: Coverage,
    /// Aggregate health.
    pub health: HealthState,
    /// What an operator should do next.
    pub recommendation: String,
    /// When this status was computed.
    pub checked_at: DateTime<Utc>,
}

impl OrchestratorStatus {
    /// Build a report from store snapshots and the routing table.
    #[must_use]
    pub fn from_snapshots(snapshots: &[ServiceSnapshot], table: &RoutingTable) -> Self {
        let is_active = |id: &str| {
            snapshots
                .iter()
                .any(|s| s.id() == id && s.status == ServiceStatus::Active)
        };

        let coverage = Coverage {
            active: snapshots
                .iter()
                .filter(|s| s.status == ServiceStatus::Active)
                .count(),
            total: snapshots.len(),
            critical_active: snapshots
                .iter()
                .filter(|s| s.definition.critical && s.status == ServiceStatus::Active)
                .count(),
            critical_total: snapshots.iter().filter(|s| s.definition.critical).count(),
            capabilities_routable: table
                .entries()
                .filter(|(_, ids)| ids.iter().any(|id| is_active(id)))
                .count(),
            capabilities_total: table.len(),
        };

        let services: Vec<ServiceReport> = snapshots.iter().map(ServiceReport::from).collect();
        let health = aggregate(&services, &coverage);
        let recommendation = recommend(health, &services, &coverage);

        Self {
            services,
            coverage,
            health,
            recommendation,
            checked_at: Utc::now(),
        }
    }

    /// Whether the aggregate state is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.health == HealthState::Healthy
    }

    /// Rows with the given status.
    #[must_use]
    pub fn services_by_status(&self, status: ServiceStatus) -> Vec<&ServiceReport> {
        self.services.iter().filter(|s| s.status == status).collect()
    }
}

fn aggregate(services: &[ServiceReport], coverage: &Coverage) -> HealthState {
    if services.is_empty() {
        return HealthState::Unknown;
    }
    if coverage.critical_total > 0 && coverage.critical_active == 0 {
        return HealthState::Unhealthy;
    }

    let any_error = services.iter().any(|s| s.status == ServiceStatus::Error);
    if coverage.critical_active < coverage.critical_total || any_error {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}

fn recommend(health: HealthState, services: &[ServiceReport], coverage: &Coverage) -> String {
    let ids = |pred: fn(&ServiceReport) -> bool| {
        services
            .iter()
            .filter(|s| pred(s))
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    match health {
        HealthState::Unknown => {
            "No services registered; add [[services]] entries to the configuration.".to_string()
        },
        HealthState::Unhealthy => format!(
            "No critical service is active ({}). Check adapter commands and required \
             environment variables.",
            ids(|s| s.critical)
        ),
        HealthState::Degraded => {
            let down = ids(|s| s.critical && s.status != ServiceStatus::Active);
            if down.is_empty() {
                format!(
                    "Services in error: {}. Start them explicitly once fixed.",
                    ids(|s| s.status == ServiceStatus::Error)
                )
            } else {
                format!("Critical services down: {down}. Check their logs and required environment.")
            }
        },
        HealthState::Healthy => format!(
            "All critical services active; {} of {} capabilities routable.",
            coverage.capabilities_routable, coverage.capabilities_total
        ),
    }
}
