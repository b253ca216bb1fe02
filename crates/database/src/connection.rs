use crate::error::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Establishes a connection pool to the competition's SQLite ledger file.
///
/// The url is injected by the caller (typically from `arena.toml`); this
/// crate never probes the environment itself. The database file is created
/// on first use, and foreign keys are switched on so the schema's
/// referential invariants are enforced by the engine, not by convention.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Creates a private in-memory ledger, used by tests and dry runs.
///
/// In-memory SQLite databases are per-connection, so the pool is pinned to a
/// single connection to keep every query looking at the same ledger.
pub async fn connect_in_memory() -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// A utility function to run database migrations automatically.
///
/// This is useful for ensuring the ledger schema is up-to-date when the
/// application starts, which matters for long-running competitions that
/// survive process restarts.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
