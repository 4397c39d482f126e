//! Database adapters (connection pool, migrations wiring).

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{map_sqlx_error, StoreError};

/// Connect a Postgres pool and verify it with a round trip.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| map_sqlx_error("connect_check", e))?;

    info!(max_connections = config.max_connections, "connected to postgres");
    Ok(pool)
}

/// Apply the embedded schema migrations (`crates/infra/migrations`).
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Persistence(format!("migration failed: {e}")))?;
    info!("database migrations applied");
    Ok(())
}
