//! SQLite persistence layer
//!
//! Repository implementations of the core ports plus the shared connection
//! manager. Column conversion helpers live here so both raw-record
//! repositories map rows the same way.

pub mod activity_directory;
pub mod manager;
pub mod time_clocking_repository;
pub mod time_entries;
pub mod work_proof_repository;

pub use activity_directory::SqliteActivityDirectory;
pub use manager::{DbConnection, DbManager};
pub use time_clocking_repository::SqliteTimeClockingRepository;
pub use time_entries::SqliteTimeEntryRepository;
pub use work_proof_repository::SqliteWorkProofRepository;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Type;
use worklog_domain::{RecordStatus, WorklogError};

/// Unix-second representation of an optional timestamp.
pub(crate) fn ts_opt(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(|ts| ts.timestamp())
}

/// Decode a unix-second column back into a timestamp.
pub(crate) fn datetime_from_ts(column: usize, ts: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            Box::new(WorklogError::Database(format!("invalid timestamp {ts}"))),
        )
    })
}

/// Decode a nullable unix-second column.
pub(crate) fn opt_datetime_from_ts(
    column: usize,
    ts: Option<i64>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    ts.map(|value| datetime_from_ts(column, value)).transpose()
}

/// ISO-8601 text representation of a calendar day.
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Decode an ISO-8601 date column.
pub(crate) fn date_from_sql(column: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
    })
}

/// Decode a nullable status column; NULL reads as pending.
pub(crate) fn status_from_sql(
    column: usize,
    value: Option<String>,
) -> rusqlite::Result<RecordStatus> {
    match value {
        None => Ok(RecordStatus::Pending),
        Some(text) => text.parse().map_err(|err: WorklogError| {
            rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
        }),
    }
}
