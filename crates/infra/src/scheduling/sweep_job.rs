//! Concrete sweep job wiring both record kinds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::instrument;
use worklog_core::ConsolidationService;
use worklog_domain::{AccountingPolicy, Config};

use crate::errors::InfraError;
use crate::scheduling::sweep_scheduler::SweepJob;

/// Sweeps stale records of both kinds in one pass.
///
/// Work proofs run first so that force-closed intervals are consolidated
/// in the same pass that closes them.
pub struct StaleSweepJob {
    work_proofs: Arc<ConsolidationService>,
    time_clockings: Arc<ConsolidationService>,
    work_proof_policy: AccountingPolicy,
    time_clocking_policy: AccountingPolicy,
    stale_after: Duration,
}

impl StaleSweepJob {
    /// Build the job from the application configuration.
    pub fn new(
        work_proofs: Arc<ConsolidationService>,
        time_clockings: Arc<ConsolidationService>,
        config: &Config,
    ) -> Self {
        Self {
            work_proofs,
            time_clockings,
            work_proof_policy: config.consolidation.work_proof_policy,
            time_clocking_policy: config.consolidation.time_clocking_policy,
            stale_after: Duration::hours(config.sweep.stale_after_hours as i64),
        }
    }
}

#[async_trait]
impl SweepJob for StaleSweepJob {
    #[instrument(skip(self))]
    async fn run(&self) -> Result<usize, InfraError> {
        let proofs =
            self.work_proofs.sweep_stale(self.stale_after, self.work_proof_policy).await?;
        let clockings = self
            .time_clockings
            .sweep_stale(self.stale_after, self.time_clocking_policy)
            .await?;
        Ok(proofs + clockings)
    }
}
