//! Mock store implementations for testing
//!
//! Provides in-memory mocks for the consolidation ports, enabling
//! deterministic unit tests without database dependencies. The mock
//! mirrors the store contract precisely: `consolidate` is atomic under
//! one lock, re-checks eligibility, and persists nothing on a snapshot
//! mismatch or injected failure.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use worklog_core::{ActivityDirectory, RawRecordStore};
use worklog_domain::{
    NewTimeEntry, RawRecord, RecordStatus, Result as DomainResult, ScopeKey, TimeEntry,
    WorklogError,
};

/// In-memory mock for `RawRecordStore`.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<RawRecord>>,
    entries: Mutex<Vec<TimeEntry>>,
    next_record_id: AtomicI64,
    next_entry_id: AtomicI64,
    fail_scope: Mutex<Option<ScopeKey>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            next_record_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Snapshot of all stored records.
    pub fn records(&self) -> Vec<RawRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Snapshot of all created time entries.
    pub fn entries(&self) -> Vec<TimeEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Make the next `consolidate` call for `scope` fail like a store
    /// rejecting the transaction mid-batch.
    pub fn fail_consolidation_for(&self, scope: ScopeKey) {
        *self.fail_scope.lock().unwrap() = Some(scope);
    }
}

#[async_trait]
impl RawRecordStore for InMemoryRecordStore {
    async fn insert(&self, mut record: RawRecord) -> DomainResult<RawRecord> {
        record.validate()?;
        record.id = self.next_record_id.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<RawRecord>> {
        Ok(self.records.lock().unwrap().iter().find(|record| record.id == id).cloned())
    }

    async fn find_eligible(&self, scope: &ScopeKey) -> DomainResult<Vec<RawRecord>> {
        let mut eligible: Vec<RawRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.scope_key() == *scope && record.is_eligible())
            .cloned()
            .collect();
        eligible.sort_by_key(|record| record.id);
        Ok(eligible)
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<RawRecord>> {
        let mut stale: Vec<RawRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| {
                !record.is_consolidated()
                    && (record.is_eligible() || record.is_open())
                    && record.stale_reference() < cutoff
            })
            .cloned()
            .collect();
        stale.sort_by_key(|record| record.id);
        Ok(stale)
    }

    async fn force_close(
        &self,
        id: i64,
        closed_at: DateTime<Utc>,
        hours: f64,
    ) -> DomainResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| WorklogError::NotFound(format!("record {id}")))?;
        record.clocked_out_at = Some(closed_at);
        record.hours = Some(hours);
        record.status = RecordStatus::Calculated;
        Ok(())
    }

    async fn consolidate(
        &self,
        scope: &ScopeKey,
        record_ids: &[i64],
        entry: NewTimeEntry,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<TimeEntry>> {
        if self.fail_scope.lock().unwrap().as_ref() == Some(scope) {
            return Err(WorklogError::Database(format!(
                "injected consolidation failure for {scope}"
            )));
        }

        let mut records = self.records.lock().unwrap();

        let mut still_eligible: Vec<i64> = records
            .iter()
            .filter(|record| record.scope_key() == *scope && record.is_eligible())
            .map(|record| record.id)
            .collect();
        still_eligible.sort_unstable();

        if still_eligible.is_empty() || still_eligible != record_ids {
            return Ok(None);
        }

        let entry_id = self.next_entry_id.fetch_add(1, Ordering::SeqCst);
        let created = TimeEntry {
            id: entry_id,
            project_id: entry.project_id,
            issue_id: entry.issue_id,
            user_id: entry.user_id,
            spent_on: entry.spent_on,
            hours: entry.hours,
            activity_id: entry.activity_id,
            comments: entry.comments,
            created_at: at,
        };
        self.entries.lock().unwrap().push(created.clone());

        for record in records.iter_mut() {
            if record_ids.contains(&record.id) {
                record.mark_consolidated(entry_id, at);
            }
        }

        Ok(Some(created))
    }
}

/// Activity directory with a fixed default.
pub struct StaticActivityDirectory {
    pub default_id: i64,
}

#[async_trait]
impl ActivityDirectory for StaticActivityDirectory {
    async fn default_activity_id(&self) -> DomainResult<i64> {
        Ok(self.default_id)
    }
}
