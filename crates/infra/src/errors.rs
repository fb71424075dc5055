//! Conversions from external infrastructure errors into domain errors.

use rusqlite::Error as SqlError;
use worklog_domain::WorklogError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub WorklogError);

impl From<InfraError> for WorklogError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<WorklogError> for InfraError {
    fn from(value: WorklogError) -> Self {
        InfraError(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → WorklogError */
/* -------------------------------------------------------------------------- */

/// Map a sqlite error onto the domain error taxonomy.
pub(crate) fn map_sql_error(err: SqlError) -> WorklogError {
    use rusqlite::ffi::ErrorCode;

    match err {
        SqlError::SqliteFailure(code, maybe_message) => {
            let message = maybe_message.unwrap_or_default();
            match code.code {
                ErrorCode::DatabaseBusy => WorklogError::Database("database is busy".into()),
                ErrorCode::DatabaseLocked => WorklogError::Database("database is locked".into()),
                ErrorCode::ConstraintViolation => {
                    WorklogError::Database(format!("constraint violation: {message}"))
                }
                _ => WorklogError::Database(format!(
                    "sqlite failure {:?} (code {}): {message}",
                    code.code, code.extended_code
                )),
            }
        }
        SqlError::QueryReturnedNoRows => {
            WorklogError::NotFound("no rows returned by query".into())
        }
        SqlError::FromSqlConversionFailure(_, _, cause) => {
            WorklogError::Database(format!("failed to convert sqlite value: {cause}"))
        }
        SqlError::InvalidColumnType(_, _, ty) => {
            WorklogError::Database(format!("invalid column type: {ty}"))
        }
        other => WorklogError::Database(other.to_string()),
    }
}

/// Map a connection pool error onto the domain error taxonomy.
pub(crate) fn map_pool_error(err: r2d2::Error) -> WorklogError {
    WorklogError::Database(format!("connection pool error: {err}"))
}

/// Map a blocking-task join failure onto the domain error taxonomy.
pub(crate) fn map_join_error(err: tokio::task::JoinError) -> WorklogError {
    WorklogError::Internal(format!("blocking task failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped = map_sql_error(SqlError::QueryReturnedNoRows);
        assert!(matches!(mapped, WorklogError::NotFound(_)));
    }

    #[test]
    fn infra_error_round_trips_the_domain_error() {
        let err = InfraError(WorklogError::Database("boom".into()));
        let back: WorklogError = err.into();
        assert!(matches!(back, WorklogError::Database(_)));
    }
}
