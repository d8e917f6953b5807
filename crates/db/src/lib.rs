//! Persistence and curation services for thematic annotation.
//!
//! Repositories take a `&PgPool` and wrap one table each. Services
//! ([`lifecycle`], [`classification`], [`taxonomy`]) take an explicit
//! [`CurationStore`] handle so they run unchanged against Postgres
//! ([`PgStore`]) or the in-process [`MemoryStore`].

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod classification;
pub mod error;
pub mod lifecycle;
pub mod memory_store;
pub mod models;
pub mod pg_store;
pub mod repositories;
pub mod store;
pub mod taxonomy;

pub use error::CurationError;
pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
pub use store::CurationStore;

pub type DbPool = sqlx::PgPool;

/// Default pool size when `DB_MAX_CONNECTIONS` is not configured.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
