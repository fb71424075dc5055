//! Time entry persistence.
//!
//! The insert helper runs inside the raw-record repositories' consolidation
//! transaction; the repository itself only exposes reads, since the engine
//! never mutates an entry after creation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use worklog_domain::{NewTimeEntry, Result as DomainResult, TimeEntry};

use super::manager::DbManager;
use super::{date_from_sql, date_to_sql, datetime_from_ts};
use crate::errors::{map_join_error, map_sql_error};

/// Insert one time entry as part of an open transaction and return it with
/// its assigned id.
pub(crate) fn insert_time_entry(
    conn: &Connection,
    entry: &NewTimeEntry,
    at: DateTime<Utc>,
) -> rusqlite::Result<TimeEntry> {
    conn.execute(
        "INSERT INTO time_entries
            (project_id, issue_id, user_id, spent_on, hours, activity_id, comments, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.project_id,
            entry.issue_id,
            entry.user_id,
            date_to_sql(entry.spent_on),
            entry.hours,
            entry.activity_id,
            entry.comments,
            at.timestamp(),
        ],
    )?;

    Ok(TimeEntry {
        id: conn.last_insert_rowid(),
        project_id: entry.project_id,
        issue_id: entry.issue_id,
        user_id: entry.user_id,
        spent_on: entry.spent_on,
        hours: entry.hours,
        activity_id: entry.activity_id,
        comments: entry.comments.clone(),
        created_at: at,
    })
}

fn map_time_entry_row(row: &Row<'_>) -> rusqlite::Result<TimeEntry> {
    let spent_on: String = row.get(4)?;
    Ok(TimeEntry {
        id: row.get(0)?,
        project_id: row.get(1)?,
        issue_id: row.get(2)?,
        user_id: row.get(3)?,
        spent_on: date_from_sql(4, &spent_on)?,
        hours: row.get(5)?,
        activity_id: row.get(6)?,
        comments: row.get(7)?,
        created_at: datetime_from_ts(8, row.get(8)?)?,
    })
}

/// Read-only view over created time entries.
pub struct SqliteTimeEntryRepository {
    db: Arc<DbManager>,
}

impl SqliteTimeEntryRepository {
    /// Create a new repository instance.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Fetch one entry by id.
    pub async fn find_by_id(&self, id: i64) -> DomainResult<Option<TimeEntry>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Option<TimeEntry>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT id, project_id, issue_id, user_id, spent_on, hours, activity_id,
                        comments, created_at
                 FROM time_entries WHERE id = ?1",
                params![id],
                map_time_entry_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Total number of entries the engine has created.
    pub async fn count(&self) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            conn.query_row("SELECT COUNT(*) FROM time_entries", [], |row| row.get(0))
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
