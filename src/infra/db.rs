use anyhow::{Context, Result};
use diesel::{Connection, PgConnection};
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, bb8::Pool},
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

use crate::infra::{aliases::DbPool, config::DatabaseConfig};

pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .build(manager)
        .await
        .context("Failed to create database connection pool")?;

    tracing::info!("DB connection pool created (max {})", config.pool_size);

    Ok(pool)
}

/// Runs pending migrations on a dedicated synchronous connection and returns how many were
/// applied.
pub async fn run_migrations_blocking(migrations: EmbeddedMigrations, url: &str) -> Result<usize> {
    let url = url.to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn =
            PgConnection::establish(&url).context("Failed to connect for migrations")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow::anyhow!(err))
            .context("Failed to run migrations")?;
        Ok(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
