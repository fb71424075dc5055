use std::sync::{Arc, Once};

use chrono::{Duration, NaiveDate, Utc};
use tempfile::TempDir;
use worklog_domain::{RawRecord, RecordKind};
use worklog_infra::DbManager;

static INIT_TRACING: Once = Once::new();

/// Route engine logs through a test-friendly subscriber once per binary.
fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the full schema applied.
    pub fn new() -> Self {
        init_tracing();
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should succeed");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 17).expect("valid date")
}

/// A self-reported clocking carrying explicit hours, ready for
/// consolidation as inserted.
pub fn pending_clocking(issue_id: i64, user_id: i64, hours: f64) -> RawRecord {
    let mut record = RawRecord::new(RecordKind::TimeClocking, 1, issue_id, user_id, test_date());
    record.hours = Some(hours);
    record
}

/// A work proof whose interval was clocked in and out, eligible for
/// consolidation as inserted.
pub fn closed_proof(issue_id: i64, user_id: i64, hours: f64) -> RawRecord {
    let mut record = RawRecord::new(RecordKind::WorkProof, 1, issue_id, user_id, test_date());
    let started = Utc::now() - Duration::minutes(30);
    record.clock_in(started).expect("clock in");
    record.clock_out(Utc::now(), Some(hours)).expect("clock out");
    record
}

/// A work proof still inside its work interval.
pub fn open_proof(issue_id: i64, user_id: i64) -> RawRecord {
    let mut record = RawRecord::new(RecordKind::WorkProof, 1, issue_id, user_id, test_date());
    record.clock_in(Utc::now() - Duration::hours(6)).expect("clock in");
    record
}
