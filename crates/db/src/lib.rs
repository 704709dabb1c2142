//! Relational store access for jobtrail.
//!
//! - [`gateway`] -- the retry-wrapped [`DataStore`] every repository goes through.
//! - [`value`] -- positional parameters and decoded rows.
//! - [`models`] / [`repositories`] -- refresh-token records and identity lookups.

use sqlx::postgres::PgPoolOptions;

pub mod gateway;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod models;
pub mod repositories;
pub mod value;

pub use gateway::{DataStore, PgExecutor, QueryError, QueryExecutor};
pub use value::{Row, RowSet, SqlValue};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the pool can reach the server.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations (`users`, `refresh_tokens`).
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Close every pooled connection. Call once during teardown.
pub async fn close_pool(pool: &DbPool) {
    pool.close().await;
    tracing::info!("Database connection pool closed");
}
