//! Consolidation engine - core business logic
//!
//! One service instance per record kind. `consolidate_scope` is the
//! on-demand entry point for a single (issue, user, date) scope;
//! `sweep_stale` is the batch entry point used by the background sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};
use worklog_domain::{
    AccountingPolicy, ConsolidationOutcome, NewTimeEntry, RawRecord, RecordKind, Result, ScopeKey,
    WorklogError,
};

use super::policy::aggregate_hours;
use super::ports::{ActivityDirectory, RawRecordStore};

/// Keyed mutual exclusion: concurrent calls against the same scope are
/// serialized, distinct scopes run freely in parallel.
#[derive(Default)]
struct ScopeLocks {
    locks: StdMutex<HashMap<ScopeKey, Arc<AsyncMutex<()>>>>,
}

impl ScopeLocks {
    fn acquire(&self, scope: &ScopeKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(*scope).or_default())
    }
}

/// Consolidation engine for one raw-record kind.
pub struct ConsolidationService {
    kind: RecordKind,
    store: Arc<dyn RawRecordStore>,
    activities: Arc<dyn ActivityDirectory>,
    locks: ScopeLocks,
}

impl ConsolidationService {
    /// Create an engine over the given store and activity directory.
    pub fn new(
        kind: RecordKind,
        store: Arc<dyn RawRecordStore>,
        activities: Arc<dyn ActivityDirectory>,
    ) -> Self {
        Self { kind, store, activities, locks: ScopeLocks::default() }
    }

    /// Record kind this engine consolidates.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Roll every eligible record of one scope into a single time entry.
    ///
    /// Returns [`ConsolidationOutcome::NoOp`] when nothing is eligible —
    /// including on an immediate repeat call, which is what makes the
    /// operation idempotent. Persistence failures surface as errors with
    /// scope context; nothing is retried and nothing partial is left
    /// behind.
    pub async fn consolidate_scope(
        &self,
        scope: &ScopeKey,
        policy: AccountingPolicy,
    ) -> Result<ConsolidationOutcome> {
        scope.validate()?;

        let lock = self.locks.acquire(scope);
        let _guard = lock.lock().await;

        // The store re-checks eligibility inside its transaction. When the
        // snapshot moved under us it persists nothing, and selection is
        // re-run once before giving up with NoOp.
        for _ in 0..2 {
            let records = self.store.find_eligible(scope).await?;
            let Some(hours) = aggregate_hours(&records, policy) else {
                return Ok(ConsolidationOutcome::NoOp);
            };

            let entry = self.build_entry(scope, &records, hours).await?;
            let record_ids: Vec<i64> = records.iter().map(|record| record.id).collect();

            match self.store.consolidate(scope, &record_ids, entry, Utc::now()).await {
                Ok(Some(created)) => {
                    info!(
                        scope = %scope,
                        kind = ?self.kind,
                        records = record_ids.len(),
                        hours = created.hours,
                        time_entry_id = created.id,
                        "consolidated scope into time entry"
                    );
                    return Ok(ConsolidationOutcome::Consolidated(created));
                }
                Ok(None) => continue,
                Err(err) => {
                    error!(
                        scope = %scope,
                        kind = ?self.kind,
                        error = %err,
                        "consolidation transaction failed"
                    );
                    return Err(err);
                }
            }
        }

        Ok(ConsolidationOutcome::NoOp)
    }

    /// Find all stale unconsolidated records, group them by scope, and
    /// consolidate each group.
    ///
    /// Work proofs still open at sweep time are force-closed first (hours
    /// inferred from elapsed time). A failure in one group is logged and
    /// does not abort the others. Returns the number of raw records
    /// consolidated across successful groups.
    pub async fn sweep_stale(
        &self,
        age_threshold: Duration,
        policy: AccountingPolicy,
    ) -> Result<usize> {
        let now = Utc::now();
        let stale = self.store.find_stale(now - age_threshold).await?;
        if stale.is_empty() {
            return Ok(0);
        }

        let groups = partition_by_scope(stale);
        let group_count = groups.len();

        let mut consolidated = 0usize;
        for (scope, records) in groups {
            match self.sweep_group(&scope, &records, policy, now).await {
                Ok(count) => consolidated += count,
                Err(err) => {
                    warn!(
                        scope = %scope,
                        kind = ?self.kind,
                        error = %err,
                        "sweep group failed, continuing with remaining groups"
                    );
                }
            }
        }

        info!(kind = ?self.kind, consolidated, groups = group_count, "stale sweep finished");
        Ok(consolidated)
    }

    /// Consolidate one sweep group, force-closing open work proofs first.
    ///
    /// The force close is deliberately not atomic with the consolidation:
    /// a crash in between leaves a `Calculated` record that stays eligible
    /// for the next sweep.
    async fn sweep_group(
        &self,
        scope: &ScopeKey,
        records: &[RawRecord],
        policy: AccountingPolicy,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        for record in records {
            if record.is_open() {
                let mut closed = record.clone();
                closed.force_close(now)?;
                self.store.force_close(record.id, now, closed.hours.unwrap_or(0.0)).await?;
            }
        }

        match self.consolidate_scope(scope, policy).await? {
            ConsolidationOutcome::Consolidated(_) => Ok(records.len()),
            ConsolidationOutcome::NoOp => Ok(0),
        }
    }

    /// Build the time entry payload: project and activity come from the
    /// first eligible record (ascending id), falling back to the directory
    /// default when the record has no category.
    async fn build_entry(
        &self,
        scope: &ScopeKey,
        records: &[RawRecord],
        hours: f64,
    ) -> Result<NewTimeEntry> {
        let first = records
            .first()
            .ok_or_else(|| WorklogError::Internal("eligible set must not be empty".into()))?;

        let activity_id = match first.activity_id {
            Some(id) => id,
            None => self.activities.default_activity_id().await?,
        };

        Ok(NewTimeEntry {
            project_id: first.project_id,
            issue_id: scope.issue_id,
            user_id: scope.user_id,
            spent_on: scope.date,
            hours,
            activity_id,
            comments: format!(
                "Consolidated from {} {}(s) - {}h",
                records.len(),
                self.kind.label(),
                hours
            ),
        })
    }
}

/// Partition an already-fetched record set by scope key. Purely in-memory,
/// no additional query.
fn partition_by_scope(records: Vec<RawRecord>) -> HashMap<ScopeKey, Vec<RawRecord>> {
    let mut groups: HashMap<ScopeKey, Vec<RawRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.scope_key()).or_default().push(record);
    }
    groups
}
