//! Port interfaces for consolidation
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use worklog_domain::{NewTimeEntry, RawRecord, Result, ScopeKey, TimeEntry};

/// Trait for querying and transitioning raw work records of one kind.
///
/// One implementation exists per [`worklog_domain::RecordKind`]; the
/// consolidation service itself is kind-agnostic.
#[async_trait]
pub trait RawRecordStore: Send + Sync {
    /// Persist a new raw record, returning it with its assigned id.
    async fn insert(&self, record: RawRecord) -> Result<RawRecord>;

    /// Fetch a single record by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<RawRecord>>;

    /// Records in the scope that are eligible for consolidation, in
    /// ascending id order.
    async fn find_eligible(&self, scope: &ScopeKey) -> Result<Vec<RawRecord>>;

    /// Unconsolidated records in an eligible or still-open status whose
    /// staleness reference timestamp is older than `cutoff`.
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<RawRecord>>;

    /// Persist a sweep-side force close: stamp `closed_at`, store the
    /// inferred hours, and mark the record `Calculated`.
    async fn force_close(&self, id: i64, closed_at: DateTime<Utc>, hours: f64) -> Result<()>;

    /// The atomic consolidation step.
    ///
    /// In one all-or-nothing transaction: re-verify that exactly the
    /// records in `record_ids` are still eligible within `scope`, insert
    /// the time entry, and mark every record consolidated and linked to it.
    /// Returns `Ok(None)` without persisting anything when the eligible
    /// set no longer matches (a concurrent call consumed or changed it);
    /// any store failure rolls the whole transaction back.
    async fn consolidate(
        &self,
        scope: &ScopeKey,
        record_ids: &[i64],
        entry: NewTimeEntry,
        at: DateTime<Utc>,
    ) -> Result<Option<TimeEntry>>;
}

/// Trait for looking up the default accounting activity.
#[async_trait]
pub trait ActivityDirectory: Send + Sync {
    /// Activity substituted when a raw record carries no explicit category.
    async fn default_activity_id(&self) -> Result<i64>;
}
