//! Default activity lookup.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio::task;
use worklog_core::ActivityDirectory as ActivityDirectoryPort;
use worklog_domain::constants::FALLBACK_ACTIVITY_ID;
use worklog_domain::Result as DomainResult;

use super::manager::DbManager;
use crate::errors::{map_join_error, map_sql_error};

/// SQLite-backed implementation of `ActivityDirectory`.
///
/// Mirrors the upstream tracker's behavior: the first configured activity
/// wins, with a constant fallback when none exist.
pub struct SqliteActivityDirectory {
    db: Arc<DbManager>,
}

impl SqliteActivityDirectory {
    /// Create a new directory instance.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityDirectoryPort for SqliteActivityDirectory {
    async fn default_activity_id(&self) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            let first: Option<i64> = conn
                .query_row("SELECT id FROM activities ORDER BY id ASC LIMIT 1", [], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(map_sql_error)?;
            Ok(first.unwrap_or(FALLBACK_ACTIVITY_ID))
        })
        .await
        .map_err(map_join_error)?
    }
}
