//! Capability router: ordered fallback over the routing table.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::routing::RoutingTable;
use crate::store::ServiceStore;
use crate::types::AdapterResponse;

/// Executes capability requests against their candidate adapters.
///
/// Candidates are tried strictly in table order. Inactive candidates are
/// skipped, failing ones are logged and passed over; the router never
/// changes adapter status.
#[derive(Debug)]
pub struct CapabilityRouter {
    store: Arc<ServiceStore>,
    table: RoutingTable,
    call_timeout: Duration,
}

impl CapabilityRouter {
    /// Create a router over `table`.
    #[must_use]
    pub fn new(store: Arc<ServiceStore>, table: RoutingTable, call_timeout: Duration) -> Self {
        Self {
            store,
            table,
            call_timeout,
        }
    }

    /// The routing table.
    #[must_use]
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Invoke `method` on the first candidate for `capability` that
    /// answers successfully.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoServiceAvailable`] when every
    /// candidate was inactive or failed, or when there are none.
    pub async fn execute(
        &self,
        capability: &str,
        method: &str,
        params: Value,
    ) -> OrchestratorResult<AdapterResponse> {
        let span = info_span!("execute", request_id = %Uuid::new_v4(), capability, method);
        self.execute_inner(capability, method, params)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        capability: &str,
        method: &str,
        params: Value,
    ) -> OrchestratorResult<AdapterResponse> {
        let candidates = self.table.candidates(capability);
        if candidates.is_empty() {
            warn!("No candidates for capability");
        }

        for id in &candidates {
            let Some(lease) = self.store.client(id).await else {
                debug!(service = %id, "Candidate not active; skipping");
                continue;
            };

            let call = lease.client.call(method, params.clone());
            let result = match tokio::time::timeout(self.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(OrchestratorError::Timeout {
                    id: id.clone(),
                    operation: "call",
                }),
            };

            match result {
                Ok(response) if !response.is_error => {
                    info!(service = %id, "Capability served");
                    return Ok(response);
                },
                Ok(response) => {
                    warn!(
                        service = %id,
                        error = %response.text_content(),
                        "Adapter returned an error result; trying next candidate"
                    );
                },
                Err(e) => {
                    warn!(service = %id, error = %e, "Adapter call failed; trying next candidate");
                },
            }
        }

        warn!(tried = candidates.len(), "No service available");
        Err(OrchestratorError::NoServiceAvailable {
            capability: capability.to_string(),
        })
    }
}
