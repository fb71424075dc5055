//! Domain types and models
//!
//! Raw work records (work proofs and time clockings), the time entry
//! aggregate they consolidate into, and the state machines connecting them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CAPTURE_INTERVAL_MINUTES;
use crate::errors::{Result, WorklogError};

/// Which raw-record variant a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Screenshot-backed passive evidence of work.
    WorkProof,
    /// Explicit self-reported time slice.
    TimeClocking,
}

impl RecordKind {
    /// Human-readable label used in time entry provenance comments.
    pub fn label(self) -> &'static str {
        match self {
            Self::WorkProof => "work proof",
            Self::TimeClocking => "time clocking",
        }
    }
}

/// Raw record lifecycle status.
///
/// Time clockings only ever move `Pending -> Consolidated`. Work proofs
/// additionally pass through a close step: `Pending`/`ClockedIn` ->
/// `ClockedOut` (explicit close with stated hours) or `Calculated`
/// (force-closed by the sweep, hours inferred from elapsed time) ->
/// `Consolidated`. `Consolidated` is terminal for both variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    ClockedIn,
    ClockedOut,
    Calculated,
    Consolidated,
}

impl RecordStatus {
    /// Storage representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ClockedIn => "clocked_in",
            Self::ClockedOut => "clocked_out",
            Self::Calculated => "calculated",
            Self::Consolidated => "consolidated",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = WorklogError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "clocked_in" => Ok(Self::ClockedIn),
            "clocked_out" => Ok(Self::ClockedOut),
            "calculated" => Ok(Self::Calculated),
            "consolidated" => Ok(Self::Consolidated),
            other => Err(WorklogError::Validation(format!("unknown record status: {other}"))),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (issue, user, date) tuple raw records are grouped and consolidated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub issue_id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
}

impl ScopeKey {
    /// Build a scope key.
    pub fn new(issue_id: i64, user_id: i64, date: NaiveDate) -> Self {
        Self { issue_id, user_id, date }
    }

    /// Reject scope keys with missing or nonsensical identifiers before any
    /// mutation happens.
    pub fn validate(&self) -> Result<()> {
        if self.issue_id <= 0 {
            return Err(WorklogError::Validation(format!(
                "issue_id must be positive, got {}",
                self.issue_id
            )));
        }
        if self.user_id <= 0 {
            return Err(WorklogError::Validation(format!(
                "user_id must be positive, got {}",
                self.user_id
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "issue #{} / user #{} / {}", self.issue_id, self.user_id, self.date)
    }
}

/// Rule used to compute aggregate duration from eligible records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AccountingPolicy {
    /// Total is the sum of the explicit hours each record carries.
    Sum,
    /// Total is inferred from how many capture intervals were observed.
    CountInterval { interval_minutes: u32 },
}

impl AccountingPolicy {
    /// Count-interval policy at the default capture cadence.
    pub fn count_interval_default() -> Self {
        Self::CountInterval { interval_minutes: DEFAULT_CAPTURE_INTERVAL_MINUTES }
    }
}

impl Default for AccountingPolicy {
    fn default() -> Self {
        Self::Sum
    }
}

/// Round an hour value to 2 decimal places, half-up.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// A single unit of raw work evidence.
///
/// One struct covers both kinds; the work-proof clock fields stay `None`
/// for time clockings. The `status` / `consolidated` / `time_entry_id`
/// triple is a single logical consolidation state: it is only ever written
/// together through [`RawRecord::mark_consolidated`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    pub kind: RecordKind,
    pub project_id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    /// Calendar day (server-local) the evidence belongs to.
    pub date: NaiveDate,
    /// Explicit duration contribution, when the record carries one.
    pub hours: Option<f64>,
    /// Accounting category; the engine substitutes the configured default
    /// when absent at consolidation time.
    pub activity_id: Option<i64>,
    pub status: RecordStatus,
    pub consolidated: bool,
    pub consolidated_at: Option<DateTime<Utc>>,
    pub time_entry_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    // Work-proof fields
    pub image_url: Option<String>,
    pub clocked_in_at: Option<DateTime<Utc>>,
    pub clocked_out_at: Option<DateTime<Utc>>,
    // Time-clocking fields
    pub time_started_at: Option<DateTime<Utc>>,
    pub time_ended_at: Option<DateTime<Utc>>,
}

impl RawRecord {
    /// Create a pending record for the given scope. The id is assigned by
    /// the store on insert.
    pub fn new(
        kind: RecordKind,
        project_id: i64,
        issue_id: i64,
        user_id: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: 0,
            kind,
            project_id,
            issue_id,
            user_id,
            date,
            hours: None,
            activity_id: None,
            status: RecordStatus::Pending,
            consolidated: false,
            consolidated_at: None,
            time_entry_id: None,
            description: None,
            created_at: Utc::now(),
            image_url: None,
            clocked_in_at: None,
            clocked_out_at: None,
            time_started_at: None,
            time_ended_at: None,
        }
    }

    /// Scope key this record is consolidated under.
    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey::new(self.issue_id, self.user_id, self.date)
    }

    /// Validate identifier and hour fields before persisting.
    pub fn validate(&self) -> Result<()> {
        self.scope_key().validate()?;
        if self.project_id <= 0 {
            return Err(WorklogError::Validation(format!(
                "project_id must be positive, got {}",
                self.project_id
            )));
        }
        if let Some(hours) = self.hours {
            if hours < 0.0 {
                return Err(WorklogError::Validation(format!("hours must not be negative, got {hours}")));
            }
        }
        Ok(())
    }

    /// True once the record has been consumed by a consolidation.
    pub fn is_consolidated(&self) -> bool {
        self.status == RecordStatus::Consolidated || self.consolidated
    }

    /// True while a work proof's interval has not been closed yet.
    /// `ClockedIn` is equivalent to `Pending` here. Time clockings are
    /// never open.
    pub fn is_open(&self) -> bool {
        self.kind == RecordKind::WorkProof
            && matches!(self.status, RecordStatus::Pending | RecordStatus::ClockedIn)
    }

    /// Whether the record may be selected for consolidation right now.
    ///
    /// Work proofs are gated behind completion of the work interval;
    /// time clockings only need to be pending and unconsolidated.
    pub fn is_eligible(&self) -> bool {
        if self.is_consolidated() || self.time_entry_id.is_some() {
            return false;
        }
        match self.kind {
            RecordKind::WorkProof => {
                matches!(self.status, RecordStatus::ClockedOut | RecordStatus::Calculated)
            }
            RecordKind::TimeClocking => self.status == RecordStatus::Pending,
        }
    }

    /// Timestamp staleness is measured from: work start for proofs
    /// (creation when the proof was never clocked in), creation for
    /// clockings.
    pub fn stale_reference(&self) -> DateTime<Utc> {
        match self.kind {
            RecordKind::WorkProof => self.clocked_in_at.unwrap_or(self.created_at),
            RecordKind::TimeClocking => self.created_at,
        }
    }

    /// Elapsed hours from clock-in to clock-out (or `now` while still
    /// open), rounded to 2 decimal places. Zero when never clocked in.
    pub fn clock_duration(&self, now: DateTime<Utc>) -> f64 {
        let Some(started) = self.clocked_in_at else {
            return 0.0;
        };
        let ended = self.clocked_out_at.unwrap_or(now);
        let seconds = (ended - started).num_seconds().max(0) as f64;
        round_hours(seconds / 3600.0)
    }

    /// Mark the start of a work interval on a pending proof.
    pub fn clock_in(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.kind != RecordKind::WorkProof {
            return Err(WorklogError::Validation("only work proofs can be clocked in".into()));
        }
        if self.status != RecordStatus::Pending {
            return Err(WorklogError::Validation(format!(
                "cannot clock in a {} record",
                self.status
            )));
        }
        self.status = RecordStatus::ClockedIn;
        self.clocked_in_at = Some(at);
        Ok(())
    }

    /// Explicitly close a work interval. When the worker states hours they
    /// win; otherwise the elapsed clock duration is used.
    pub fn clock_out(&mut self, at: DateTime<Utc>, hours: Option<f64>) -> Result<()> {
        if !self.is_open() {
            return Err(WorklogError::Validation(format!(
                "cannot clock out a {} record",
                self.status
            )));
        }
        if let Some(hours) = hours {
            if hours < 0.0 {
                return Err(WorklogError::Validation(format!("hours must not be negative, got {hours}")));
            }
        }
        self.clocked_out_at = Some(at);
        self.hours = match hours {
            Some(explicit) => Some(round_hours(explicit)),
            None => Some(self.clock_duration(at)),
        };
        self.status = RecordStatus::ClockedOut;
        Ok(())
    }

    /// Sweep-side auto-close of a still-open proof: stamp the close time,
    /// infer hours from elapsed time, mark as `Calculated`.
    pub fn force_close(&mut self, at: DateTime<Utc>) -> Result<()> {
        if !self.is_open() {
            return Err(WorklogError::Validation(format!(
                "cannot force-close a {} record",
                self.status
            )));
        }
        self.clocked_out_at = Some(at);
        self.hours = Some(self.clock_duration(at));
        self.status = RecordStatus::Calculated;
        Ok(())
    }

    /// The single consolidation transition: status, flag, timestamp, and
    /// entry link change together or not at all.
    pub fn mark_consolidated(&mut self, time_entry_id: i64, at: DateTime<Utc>) {
        self.status = RecordStatus::Consolidated;
        self.consolidated = true;
        self.consolidated_at = Some(at);
        self.time_entry_id = Some(time_entry_id);
    }
}

/// Aggregate accounting record owned by the external time tracker once
/// created. Never mutated by the consolidation engine afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    pub project_id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub spent_on: NaiveDate,
    pub hours: f64,
    pub activity_id: i64,
    pub comments: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a time entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTimeEntry {
    pub project_id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub spent_on: NaiveDate,
    pub hours: f64,
    pub activity_id: i64,
    pub comments: String,
}

/// Caller-visible result of a consolidation call.
#[derive(Debug, Clone)]
pub enum ConsolidationOutcome {
    /// One time entry was created and the source records were marked.
    Consolidated(TimeEntry),
    /// Nothing was eligible; no record was touched.
    NoOp,
}

impl ConsolidationOutcome {
    /// True when no consolidation occurred.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    /// The created entry, when one exists.
    pub fn time_entry(&self) -> Option<&TimeEntry> {
        match self {
            Self::Consolidated(entry) => Some(entry),
            Self::NoOp => None,
        }
    }
}
