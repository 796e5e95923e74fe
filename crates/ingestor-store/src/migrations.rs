//! Schema migrations, applied via `sqlx::migrate!()` against the `migrations/` directory.

use sqlx::PgPool;
use sqlx::migrate::MigrateError;
use std::time::Duration;
use tracing::{info, warn};

/// Applies any pending migrations. Safe to call on every process startup: `sqlx` tracks
/// applied migrations in its own bookkeeping table and is a no-op once the schema is current.
///
/// # Errors
/// Returns an error if a migration fails to apply or the migration history is inconsistent
/// with the files on disk.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    info!("running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("migrations up to date");
    Ok(())
}

/// Polls until migrations are applied or `timeout` elapses, for startup sequencing when the
/// database may still be coming up (see the worker's `dbWaitTimeoutMs`).
///
/// # Errors
/// Returns the last migration error once the timeout elapses.
pub async fn wait_for_migrations(
    pool: &PgPool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), MigrateError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match run_migrations(pool).await {
            Ok(()) => return Ok(()),
            Err(err) if tokio::time::Instant::now() < deadline => {
                warn!(error = %err, "migrations not ready yet, retrying");
                tokio::time::sleep(poll_interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}
