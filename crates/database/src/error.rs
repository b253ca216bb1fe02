use thiserror::Error;

/// Failures surfaced by the ledger store.
///
/// `NotFound` and `ConstraintViolation` are fatal to the call but leave the
/// store untouched (the enclosing transaction rolls back); `Io` is the only
/// variant a caller may reasonably retry.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("The requested {0} was not found in the ledger.")]
    NotFound(&'static str),

    #[error("Ledger constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Ledger I/O failure: {0}")]
    Io(sqlx::Error),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::NotFound("row"),
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation() =>
            {
                StorageError::ConstraintViolation(db.message().to_string())
            }
            _ => StorageError::Io(err),
        }
    }
}

impl From<core_types::CoreError> for StorageError {
    fn from(err: core_types::CoreError) -> Self {
        StorageError::Corrupt(err.to_string())
    }
}
