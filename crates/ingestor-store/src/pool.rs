//! Database connection pool management

use anyhow::{Context, Result};
use ingestor_config::DatabaseConfig;
use sqlx::PgPool;

use crate::migrations::run_migrations;

/// # Errors
/// Returns an error if the database is unreachable or the connection parameters are invalid.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    config
        .create_pool()
        .await
        .context("Failed to create database pool")
}

/// Creates a pool and runs pending migrations against it.
///
/// # Errors
/// Returns an error if pool creation fails or migrations fail to apply.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = create_pool(config).await?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}
