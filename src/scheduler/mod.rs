//! Periodic driver for strategy cycles.
//!
//! Each tick runs one cycle for every known strategy concurrently. A cycle
//! only starts if its strategy's lease is free, so two cycles never race on
//! the same memory record. Failures are logged and retried next tick.

mod lease;

use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::harness::{CycleOutcome, ExecutionHarness, HarnessResult};

pub use lease::{Lease, LeaseTable};

/// Per-tick counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub executed: usize,
    pub unfilled: usize,
    pub denied: usize,
    pub no_proposal: usize,
    pub inactive: usize,
    pub not_provisioned: usize,
    /// Lease already held by an earlier, still-running cycle
    pub skipped: usize,
    pub failed: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Executed { .. } => self.executed += 1,
            CycleOutcome::Unfilled { .. } => self.unfilled += 1,
            CycleOutcome::Denied { .. } => self.denied += 1,
            CycleOutcome::NoProposal => self.no_proposal += 1,
            CycleOutcome::Inactive { .. } => self.inactive += 1,
            CycleOutcome::NotProvisioned => self.not_provisioned += 1,
        }
    }
}

pub struct Scheduler {
    harness: Arc<ExecutionHarness>,
    leases: LeaseTable,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(harness: Arc<ExecutionHarness>, tick_interval: Duration) -> Self {
        Self {
            harness,
            leases: LeaseTable::new(),
            tick_interval,
        }
    }

    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }

    /// Ids to cycle: the domain registry plus every provisioned record.
    pub fn strategy_ids(&self) -> HarnessResult<Vec<String>> {
        let store = self.harness.store();
        let domain = store.load_domain_memory()?;

        let ids: BTreeSet<String> = domain
            .strategy_registry
            .into_iter()
            .map(|s| s.id)
            .chain(store.list_strategy_ids()?)
            .collect();

        Ok(ids.into_iter().collect())
    }

    /// Run one cycle for every strategy, concurrently.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> HarnessResult<TickSummary> {
        let ids = self.strategy_ids()?;
        let mut summary = TickSummary::default();

        let mut cycles = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(lease) = self.leases.try_acquire(&id) else {
                warn!(strategy_id = %id, "Previous cycle still in flight; skipping");
                summary.skipped += 1;
                continue;
            };
            let harness = self.harness.clone();
            cycles.push(async move {
                let result = harness.run_cycle(lease.strategy_id()).await;
                (lease, result)
            });
        }

        for (lease, result) in join_all(cycles).await {
            let strategy_id = lease.strategy_id();
            match result {
                Ok(outcome) => {
                    debug!(strategy_id = %strategy_id, outcome = outcome.label(), "Cycle complete");
                    summary.record(&outcome);
                }
                Err(e) => {
                    error!(strategy_id = %strategy_id, error = %e, "Cycle failed; will retry next tick");
                    summary.failed += 1;
                }
            }
        }

        info!(
            executed = summary.executed,
            unfilled = summary.unfilled,
            denied = summary.denied,
            no_proposal = summary.no_proposal,
            inactive = summary.inactive,
            skipped = summary.skipped,
            failed = summary.failed,
            "Tick complete"
        );

        Ok(summary)
    }

    /// Tick until `shutdown` is set, finishing the tick in progress.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!(interval_secs = self.tick_interval.as_secs(), "Scheduler started");

        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.tick().await {
                error!(error = %e, "Tick failed; will retry");
            }

            // Sleep in short steps so shutdown is noticed promptly
            let mut waited = Duration::ZERO;
            let step = Duration::from_millis(250).min(self.tick_interval);
            while waited < self.tick_interval && !shutdown.load(Ordering::SeqCst) {
                tokio::time::sleep(step).await;
                waited += step;
            }
        }

        info!("Scheduler stopped");
    }
}
