//! Persistence layer: connection pool, schema catalog, row models and
//! repositories, including the annotation dispatch queue.

use sqlx::postgres::{PgPoolOptions, PgRow};

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod schema;

pub use config::DbConfig;
pub use error::DbError;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool, retrying the initial connection.
///
/// Each failed attempt is followed by a fixed `connect_backoff` sleep. After
/// `connect_retries` failures the last error is returned as
/// [`DbError::Transient`], which callers treat as fatal.
pub async fn connect(config: &DbConfig) -> Result<DbPool, DbError> {
    let options = config.connect_options()?;
    let max_attempts = config.connect_retries.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options.clone())
            .await;

        match result {
            Ok(pool) => {
                tracing::info!(attempt, schema = %config.schema, "Database connection established");
                return Ok(pool);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "Database connection failed, retrying",
                );
                tokio::time::sleep(config.connect_backoff).await;
            }
            Err(e) => {
                tracing::error!(attempts = max_attempts, error = %e, "Giving up on database connection");
                return Err(DbError::Transient {
                    attempts: max_attempts,
                    source: e,
                });
            }
        }
    }
}

/// Verify that the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Run one or more statements inside a single transaction.
///
/// Returns the rows produced by the last statement (empty for DDL and
/// plain writes). On any error the transaction is dropped, which rolls
/// back every statement in the batch and returns the connection to the
/// pool clean.
pub async fn execute<S: AsRef<str>>(
    pool: &DbPool,
    statements: &[S],
) -> Result<Vec<PgRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut rows = Vec::new();

    for statement in statements {
        rows = sqlx::query(statement.as_ref())
            .persistent(false)
            .fetch_all(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(rows)
}
