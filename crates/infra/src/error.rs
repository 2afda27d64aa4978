//! Storage error type and sqlx error mapping.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    /// A persisted row failed to decode back into its domain type. Should
    /// not happen unless the schema and the code drift apart.
    #[error("corrupt row in {operation}: {message}")]
    CorruptRow {
        operation: &'static str,
        message: String,
    },
}

pub fn map_sqlx_error(operation: &'static str, source: sqlx::Error) -> StoreError {
    StoreError::Database { operation, source }
}

/// Postgres code `23505`, raised when an insert hits a unique constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

pub(crate) fn corrupt_row(operation: &'static str, message: impl Into<String>) -> StoreError {
    StoreError::CorruptRow {
        operation,
        message: message.into(),
    }
}
