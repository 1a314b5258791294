//! Health monitor: periodic liveness probes with selective restart.
//!
//! Each sweep probes every `Active` adapter by repeating the handshake call.
//! A failed probe marks the adapter `Error`; critical adapters then get one
//! restart attempt in the same sweep, everything else stays down until
//! started explicitly.

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::store::{ServiceSnapshot, ServiceStatus, ServiceStore};
use crate::supervisor::ProcessSupervisor;

/// Outcome of one sweep. Ids are listed in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Adapters that were probed.
    pub probed: Vec<String>,
    /// Adapters whose probe failed.
    pub failed: Vec<String>,
    /// Critical adapters restarted after a failed probe.
    pub restarted: Vec<String>,
    /// Critical adapters whose restart attempt failed.
    pub restart_failed: Vec<String>,
    /// Critical adapters another start was already bringing back; the
    /// monitor did not spawn them.
    pub restart_pending: Vec<String>,
}

impl SweepReport {
    /// Whether every probe passed.
    #[must_use]
    pub fn all_healthy(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Skipped,
    Alive,
    Failed { restart: Option<Restart> },
}

enum Restart {
    Done,
    Pending,
    Failed,
}

/// Probes active adapters and restarts failed critical ones.
pub struct HealthMonitor {
    store: Arc<ServiceStore>,
    supervisor: Arc<ProcessSupervisor>,
    probe_timeout: Duration,
    concurrency: usize,
}

impl HealthMonitor {
    /// Create a monitor. `concurrency` bounds probes in flight per sweep.
    #[must_use]
    pub fn new(
        store: Arc<ServiceStore>,
        supervisor: Arc<ProcessSupervisor>,
        probe_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            supervisor,
            probe_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one sweep and wait for every probe (and restart) to finish.
    pub async fn sweep(&self) -> SweepReport {
        let active: Vec<ServiceSnapshot> = self
            .store
            .all()
            .await
            .into_iter()
            .filter(|s| s.status == ServiceStatus::Active)
            .collect();

        let mut outcomes: Vec<(usize, String, Outcome)> =
            futures::stream::iter(active.into_iter().enumerate())
                .map(|(position, snapshot)| async move {
                    let outcome = self.check(&snapshot).await;
                    (position, snapshot.definition.id.clone(), outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        outcomes.sort_by_key(|(position, _, _)| *position);

        let mut report = SweepReport::default();
        for (_, id, outcome) in outcomes {
            match outcome {
                Outcome::Skipped => continue,
                Outcome::Alive => {},
                Outcome::Failed { restart } => {
                    report.failed.push(id.clone());
                    match restart {
                        Some(Restart::Done) => report.restarted.push(id.clone()),
                        Some(Restart::Pending) => report.restart_pending.push(id.clone()),
                        Some(Restart::Failed) => report.restart_failed.push(id.clone()),
                        None => {},
                    }
                },
            }
            report.probed.push(id);
        }

        if report.all_healthy() {
            debug!(probed = report.probed.len(), "Health sweep complete");
        } else {
            info!(
                probed = report.probed.len(),
                failed = report.failed.len(),
                restarted = report.restarted.len(),
                "Health sweep found failures"
            );
        }
        report
    }

    async fn check(&self, snapshot: &ServiceSnapshot) -> Outcome {
        let id = snapshot.id();
        let Some(lease) = self.store.client(id).await else {
            return Outcome::Skipped;
        };

        let probe = lease.client.list_capabilities();
        let reason = match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(_)) => return Outcome::Alive,
            Ok(Err(e)) => e.to_string(),
            Err(_) => OrchestratorError::Timeout {
                id: id.to_string(),
                operation: "probe",
            }
            .to_string(),
        };

        let generation = lease.generation;
        drop(lease);

        let failure = OrchestratorError::ProbeFailed {
            id: id.to_string(),
            reason: reason.clone(),
        };
        warn!(service = id, error = %failure, "Service is unhealthy");

        match self.store.mark_error(id, reason, Some(generation)).await {
            Ok(true) => {},
            // Already replaced or stopped by someone else.
            Ok(false) => return Outcome::Alive,
            Err(e) => {
                warn!(service = id, error = %e, "Failed to record probe failure");
                return Outcome::Failed { restart: None };
            },
        }

        if !snapshot.definition.critical {
            return Outcome::Failed { restart: None };
        }

        let restart = match self.supervisor.start(id).await {
            Ok(true) => {
                info!(service = id, "Service restarted by health monitor");
                Restart::Done
            },
            Ok(false) => {
                debug!(service = id, "Restart already in progress");
                Restart::Pending
            },
            Err(e) => {
                warn!(service = id, error = %e, "Restart failed");
                Restart::Failed
            },
        };
        Outcome::Failed {
            restart: Some(restart),
        }
    }

    /// Run a sweep every `period` on a background task until the returned
    /// handle is cancelled or dropped. The first sweep happens one period
    /// after spawning.
    #[must_use]
    pub fn spawn(self: Arc<Self>, period: Duration) -> MonitorHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {},
                }
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = self.sweep() => {},
                }
            }
            debug!("Health monitor stopped");
        });

        info!(interval_secs = period.as_secs(), "Health monitor started");
        MonitorHandle {
            token,
            task: Some(task),
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("probe_timeout", &self.probe_timeout)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

/// Owns the background sweep task.
///
/// Cancelling is idempotent and a cancelled monitor never re-arms. Dropping
/// the handle aborts the task.
#[derive(Debug)]
pub struct MonitorHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Request cancellation without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for an in-flight sweep to wind down.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "Health monitor task panicked");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
