//! Error types for database operations

use thiserror::Error;

/// Errors surfaced by catalog lookups and query execution
///
/// Both variants are recoverable per call: the MCP layer turns them into
/// tool or resource errors and keeps serving.
#[derive(Error, Debug)]
pub enum DbError {
    /// The database could not be reached or the pool is unusable
    #[error("database connectivity error: {0}")]
    Connectivity(String),

    /// The statement failed at the engine or while decoding its rows.
    /// Carries the engine's message verbatim.
    #[error("{0}")]
    Query(String),
}

impl DbError {
    /// Whether this error came from reaching the database rather than the SQL
    pub fn is_connectivity(&self) -> bool {
        matches!(self, DbError::Connectivity(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::Query(db_err.message().to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Connectivity(err.to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}

/// Result type alias for database operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_connectivity() {
        assert!(DbError::from(sqlx::Error::PoolTimedOut).is_connectivity());
        assert!(DbError::from(sqlx::Error::PoolClosed).is_connectivity());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(DbError::from(sqlx::Error::Io(io)).is_connectivity());
    }

    #[test]
    fn test_decode_errors_are_query_errors() {
        let err = DbError::from(sqlx::Error::ColumnNotFound("x".to_string()));
        assert!(!err.is_connectivity());
        assert!(err.to_string().contains('x'));
    }

    #[test]
    fn test_query_error_displays_message_verbatim() {
        let err = DbError::Query("cannot execute DELETE in a read-only transaction".to_string());
        assert_eq!(
            err.to_string(),
            "cannot execute DELETE in a read-only transaction"
        );
    }
}
