//! SQLite-backed work proof store.
//!
//! Implements the `RawRecordStore` port for the screenshot-backed evidence
//! variant. The consolidation step runs as one IMMEDIATE transaction: it
//! re-verifies eligibility, inserts the time entry, and marks the source
//! rows — or persists nothing at all.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use tokio::task;
use worklog_core::RawRecordStore as RawRecordStorePort;
use worklog_domain::{
    NewTimeEntry, RawRecord, RecordKind, Result as DomainResult, ScopeKey, TimeEntry, WorklogError,
};

use super::manager::DbManager;
use super::time_entries::insert_time_entry;
use super::{
    date_from_sql, date_to_sql, datetime_from_ts, opt_datetime_from_ts, status_from_sql, ts_opt,
};
use crate::errors::{map_join_error, map_sql_error};

const COLUMNS: &str = "id, project_id, issue_id, user_id, date, image_url, work_hours, \
     activity_id, status, consolidated, consolidated_at, time_entry_id, description, \
     created_at, clocked_in_at, clocked_out_at";

/// A proof is selectable once its work interval is closed and it has not
/// been consumed yet.
const ELIGIBLE_WHERE: &str =
    "consolidated = 0 AND time_entry_id IS NULL AND status IN ('clocked_out', 'calculated')";

/// SQLite-backed implementation of `RawRecordStore` for work proofs.
pub struct SqliteWorkProofRepository {
    db: Arc<DbManager>,
}

impl SqliteWorkProofRepository {
    /// Create a new repository instance.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RawRecordStorePort for SqliteWorkProofRepository {
    async fn insert(&self, mut record: RawRecord) -> DomainResult<RawRecord> {
        if record.kind != RecordKind::WorkProof {
            return Err(WorklogError::Validation(format!(
                "work proof store cannot persist a {:?} record",
                record.kind
            )));
        }
        record.validate()?;

        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<RawRecord> {
            let conn = db.get_connection()?;
            record.id = insert_work_proof(&conn, &record).map_err(map_sql_error)?;
            Ok(record)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<RawRecord>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Option<RawRecord>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM work_proofs WHERE id = ?1"),
                params![id],
                map_work_proof_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_eligible(&self, scope: &ScopeKey) -> DomainResult<Vec<RawRecord>> {
        let db = Arc::clone(&self.db);
        let scope = *scope;
        task::spawn_blocking(move || -> DomainResult<Vec<RawRecord>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM work_proofs
                     WHERE issue_id = ?1 AND user_id = ?2 AND date = ?3 AND {ELIGIBLE_WHERE}
                     ORDER BY id ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(
                    params![scope.issue_id, scope.user_id, date_to_sql(scope.date)],
                    map_work_proof_row,
                )
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<RawRecord>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Vec<RawRecord>> {
            let conn = db.get_connection()?;
            // Age is measured from work start; proofs that were never
            // clocked in fall back to creation time.
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM work_proofs
                     WHERE consolidated = 0 AND time_entry_id IS NULL
                       AND status IN ('pending', 'clocked_in', 'clocked_out', 'calculated')
                       AND COALESCE(clocked_in_at, created_at) < ?1
                     ORDER BY id ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![cutoff.timestamp()], map_work_proof_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn force_close(
        &self,
        id: i64,
        closed_at: DateTime<Utc>,
        hours: f64,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE work_proofs
                     SET status = 'calculated', clocked_out_at = ?1, work_hours = ?2
                     WHERE id = ?3 AND status IN ('pending', 'clocked_in')",
                    params![closed_at.timestamp(), hours, id],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(WorklogError::NotFound(format!("open work proof {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn consolidate(
        &self,
        scope: &ScopeKey,
        record_ids: &[i64],
        entry: NewTimeEntry,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<TimeEntry>> {
        let db = Arc::clone(&self.db);
        let scope = *scope;
        let ids = record_ids.to_vec();
        task::spawn_blocking(move || -> DomainResult<Option<TimeEntry>> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            // The snapshot moved under us when this no longer matches;
            // dropping the transaction persists nothing.
            let still = eligible_ids(&tx, &scope).map_err(map_sql_error)?;
            if still.is_empty() || still != ids {
                return Ok(None);
            }

            let created = insert_time_entry(&tx, &entry, at).map_err(map_sql_error)?;
            let marked = mark_consolidated(&tx, &ids, created.id, at).map_err(map_sql_error)?;
            if marked != ids.len() {
                return Err(WorklogError::Database(format!(
                    "expected to mark {} work proofs consolidated, marked {marked}",
                    ids.len()
                )));
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(Some(created))
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn map_work_proof_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    let date: String = row.get(4)?;
    let status: Option<String> = row.get(8)?;
    Ok(RawRecord {
        id: row.get(0)?,
        kind: RecordKind::WorkProof,
        project_id: row.get(1)?,
        issue_id: row.get(2)?,
        user_id: row.get(3)?,
        date: date_from_sql(4, &date)?,
        hours: row.get(6)?,
        activity_id: row.get(7)?,
        status: status_from_sql(8, status)?,
        consolidated: row.get(9)?,
        consolidated_at: opt_datetime_from_ts(10, row.get(10)?)?,
        time_entry_id: row.get(11)?,
        description: row.get(12)?,
        created_at: datetime_from_ts(13, row.get(13)?)?,
        image_url: row.get(5)?,
        clocked_in_at: opt_datetime_from_ts(14, row.get(14)?)?,
        clocked_out_at: opt_datetime_from_ts(15, row.get(15)?)?,
        time_started_at: None,
        time_ended_at: None,
    })
}

fn insert_work_proof(conn: &Connection, record: &RawRecord) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO work_proofs
            (project_id, issue_id, user_id, date, image_url, work_hours, activity_id,
             status, consolidated, consolidated_at, time_entry_id, description,
             created_at, clocked_in_at, clocked_out_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            record.project_id,
            record.issue_id,
            record.user_id,
            date_to_sql(record.date),
            record.image_url,
            record.hours,
            record.activity_id,
            record.status.as_str(),
            record.consolidated,
            ts_opt(record.consolidated_at),
            record.time_entry_id,
            record.description,
            record.created_at.timestamp(),
            ts_opt(record.clocked_in_at),
            ts_opt(record.clocked_out_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn eligible_ids(conn: &Connection, scope: &ScopeKey) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM work_proofs
         WHERE issue_id = ?1 AND user_id = ?2 AND date = ?3 AND {ELIGIBLE_WHERE}
         ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map(
        params![scope.issue_id, scope.user_id, date_to_sql(scope.date)],
        |row| row.get(0),
    )?;
    rows.collect()
}

fn mark_consolidated(
    conn: &Connection,
    ids: &[i64],
    time_entry_id: i64,
    at: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "UPDATE work_proofs
         SET status = 'consolidated', consolidated = 1, consolidated_at = ?, time_entry_id = ?
         WHERE id IN ({placeholders}) AND consolidated = 0"
    );
    let mut values: Vec<Value> = vec![Value::Integer(at.timestamp()), Value::Integer(time_entry_id)];
    values.extend(ids.iter().map(|id| Value::Integer(*id)));
    conn.execute(&sql, params_from_iter(values))
}
