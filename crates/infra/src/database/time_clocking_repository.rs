//! SQLite-backed time clocking store.
//!
//! Implements the `RawRecordStore` port for the self-reported variant.
//! Legacy rows may carry NULL status / consolidated columns, which read as
//! pending / unconsolidated; the eligibility predicates use COALESCE for
//! that reason.

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

const COLUMNS: &str = "id, project_id, issue_id, user_id, date, time_hours, time_started_at, \
     time_ended_at, activity_id, status, consolidated, consolidated_at, time_entry_id, \
     description, created_at";

/// A clocking is selectable while it is still pending and unconsumed.
const ELIGIBLE_WHERE: &str = "COALESCE(consolidated, 0) = 0 AND time_entry_id IS NULL \
     AND COALESCE(status, 'pending') = 'pending'";

/// SQLite-backed implementation of `RawRecordStore` for time clockings.
pub struct SqliteTimeClockingRepository {
    db: Arc<DbManager>,
}

impl SqliteTimeClockingRepository {
    /// Create a new repository instance.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RawRecordStorePort for SqliteTimeClockingRepository {
    async fn insert(&self, mut record: RawRecord) -> DomainResult<RawRecord> {
        if record.kind != RecordKind::TimeClocking {
            return Err(WorklogError::Validation(format!(
                "time clocking store cannot persist a {:?} record",
                record.kind
            )));
        }
        record.validate()?;

        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<RawRecord> {
            let conn = db.get_connection()?;
            record.id = insert_time_clocking(&conn, &record).map_err(map_sql_error)?;
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
                &format!("SELECT {COLUMNS} FROM time_clockings WHERE id = ?1"),
                params![id],
                map_time_clocking_row,
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
                    "SELECT {COLUMNS} FROM time_clockings
                     WHERE issue_id = ?1 AND user_id = ?2 AND date = ?3 AND {ELIGIBLE_WHERE}
                     ORDER BY id ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(
                    params![scope.issue_id, scope.user_id, date_to_sql(scope.date)],
                    map_time_clocking_row,
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
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM time_clockings
                     WHERE {ELIGIBLE_WHERE} AND created_at < ?1
                     ORDER BY id ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![cutoff.timestamp()], map_time_clocking_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn force_close(
        &self,
        id: i64,
        _closed_at: DateTime<Utc>,
        _hours: f64,
    ) -> DomainResult<()> {
        // Clockings have no open interval, so the sweep never requests this.
        Err(WorklogError::Internal(format!(
            "time clocking {id} cannot be force-closed: clockings are never open"
        )))
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

            let still = eligible_ids(&tx, &scope).map_err(map_sql_error)?;
            if still.is_empty() || still != ids {
                return Ok(None);
            }

            let created = insert_time_entry(&tx, &entry, at).map_err(map_sql_error)?;
            let marked = mark_consolidated(&tx, &ids, created.id, at).map_err(map_sql_error)?;
            if marked != ids.len() {
                return Err(WorklogError::Database(format!(
                    "expected to mark {} time clockings consolidated, marked {marked}",
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

fn map_time_clocking_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    let date: String = row.get(4)?;
    let status: Option<String> = row.get(9)?;
    let consolidated: Option<bool> = row.get(10)?;
    Ok(RawRecord {
        id: row.get(0)?,
        kind: RecordKind::TimeClocking,
        project_id: row.get(1)?,
        issue_id: row.get(2)?,
        user_id: row.get(3)?,
        date: date_from_sql(4, &date)?,
        hours: row.get(5)?,
        activity_id: row.get(8)?,
        status: status_from_sql(9, status)?,
        consolidated: consolidated.unwrap_or(false),
        consolidated_at: opt_datetime_from_ts(11, row.get(11)?)?,
        time_entry_id: row.get(12)?,
        description: row.get(13)?,
        created_at: datetime_from_ts(14, row.get(14)?)?,
        image_url: None,
        clocked_in_at: None,
        clocked_out_at: None,
        time_started_at: opt_datetime_from_ts(6, row.get(6)?)?,
        time_ended_at: opt_datetime_from_ts(7, row.get(7)?)?,
    })
}

fn insert_time_clocking(conn: &Connection, record: &RawRecord) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO time_clockings
            (project_id, issue_id, user_id, date, time_hours, time_started_at, time_ended_at,
             activity_id, status, consolidated, consolidated_at, time_entry_id, description,
             created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.project_id,
            record.issue_id,
            record.user_id,
            date_to_sql(record.date),
            record.hours,
            ts_opt(record.time_started_at),
            ts_opt(record.time_ended_at),
            record.activity_id,
            record.status.as_str(),
            record.consolidated,
            ts_opt(record.consolidated_at),
            record.time_entry_id,
            record.description,
            record.created_at.timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn eligible_ids(conn: &Connection, scope: &ScopeKey) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM time_clockings
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
        "UPDATE time_clockings
         SET status = 'consolidated', consolidated = 1, consolidated_at = ?, time_entry_id = ?
         WHERE id IN ({placeholders}) AND COALESCE(consolidated, 0) = 0"
    );
    let mut values: Vec<Value> = vec![Value::Integer(at.timestamp()), Value::Integer(time_entry_id)];
    values.extend(ids.iter().map(|id| Value::Integer(*id)));
    conn.execute(&sql, params_from_iter(values))
}
