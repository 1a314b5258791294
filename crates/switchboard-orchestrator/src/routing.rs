//! Capability routing table.
//!
//! Maps a capability tag to the ordered list of adapter ids that may serve
//! it. The table is derived once from the definitions: every adapter claiming
//! a capability, ordered by `priority` with ties broken by registration
//! order. Explicit routes replace the derived list for their capability.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::config::ServiceDefinition;

/// Capability → ordered candidate ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    routes: BTreeMap<String, Vec<String>>,
    default_route: Option<String>,
}

impl RoutingTable {
    /// Derive the table from `definitions` (in registration order), then
    /// apply `overrides`.
    #[must_use]
    pub fn derive(
        definitions: &[ServiceDefinition],
        overrides: &HashMap<String, Vec<String>>,
        default_route: Option<&str>,
    ) -> Self {
        let mut claims: BTreeMap<String, Vec<(u32, usize, &str)>> = BTreeMap::new();
        for (position, def) in definitions.iter().enumerate() {
            for capability in &def.capabilities {
                let claimants = claims.entry(capability.clone()).or_default();
                if !claimants.iter().any(|(_, _, id)| *id == def.id) {
                    claimants.push((def.priority, position, def.id.as_str()));
                }
            }
        }

        let mut routes: BTreeMap<String, Vec<String>> = claims
            .into_iter()
            .map(|(capability, mut claimants)| {
                claimants.sort_by_key(|&(priority, position, _)| (priority, position));
                let ids = claimants.into_iter().map(|(_, _, id)| id.to_string()).collect();
                (capability, ids)
            })
            .collect();

        for (capability, ids) in overrides {
            routes.insert(capability.clone(), ids.clone());
        }

        Self {
            routes,
            default_route: default_route.map(str::to_string),
        }
    }

    /// Build a table from explicit routes only.
    #[must_use]
    pub fn from_routes(
        routes: impl IntoIterator<Item = (String, Vec<String>)>,
        default_route: Option<&str>,
    ) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            default_route: default_route.map(str::to_string),
        }
    }

    /// Candidates for `capability`, in the order they should be tried.
    ///
    /// Unmapped capabilities resolve to the default route when one is set,
    /// and to nothing otherwise.
    #[must_use]
    pub fn candidates(&self, capability: &str) -> Vec<String> {
        if let Some(ids) = self.routes.get(capability) {
            return ids.clone();
        }
        match &self.default_route {
            Some(fallback) => {
                debug!(capability, fallback = %fallback, "Unmapped capability; using default route");
                vec![fallback.clone()]
            },
            None => Vec::new(),
        }
    }

    /// Whether `capability` has an explicit or derived entry.
    #[must_use]
    pub fn is_mapped(&self, capability: &str) -> bool {
        self.routes.contains_key(capability)
    }

    /// Mapped capabilities, sorted.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// All `(capability, candidates)` entries, sorted by capability.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.routes.iter().map(|(c, ids)| (c.as_str(), ids.as_slice()))
    }

    /// The fallback adapter for unmapped capabilities.
    #[must_use]
    pub fn default_route(&self) -> Option<&str> {
        self.default_route.as_deref()
    }

    /// Number of mapped capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no capability is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
