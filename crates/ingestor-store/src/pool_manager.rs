//! Connection pool management with read/write separation.

use anyhow::{Context, Result};
use ingestor_config::DatabaseConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

trait SaturatingCast {
    fn saturating_cast(self) -> u32;
}

impl SaturatingCast for usize {
    fn saturating_cast(self) -> u32 {
        u32::try_from(self).unwrap_or(u32::MAX)
    }
}

/// Configuration for connection pools.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub write_pool_size: u32,
    pub read_pool_size: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            write_pool_size: 10,
            read_pool_size: 20,
            connect_timeout: 30,
            idle_timeout: 600,
            max_lifetime: 1800,
        }
    }
}

/// Manages the write and read connection pools. There is no analytics pool: this
/// domain has no heavy-aggregation workload to isolate from transactional writes.
#[derive(Clone)]
#[allow(clippy::struct_field_names)]
pub struct PoolManager {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PoolManager {
    /// # Errors
    /// Returns an error if either pool fails to connect.
    pub async fn new(db_config: &DatabaseConfig, config: PoolConfig) -> Result<Self> {
        let base_options = db_config.connect_options()?.application_name("ingestor");

        let write_pool = PgPoolOptions::new()
            .max_connections(config.write_pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .max_lifetime(Duration::from_secs(config.max_lifetime))
            .connect_with(base_options.clone())
            .await
            .context("Failed to create write pool")?;

        let read_pool = PgPoolOptions::new()
            .max_connections(config.read_pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .max_lifetime(Duration::from_secs(config.max_lifetime))
            .connect_with(base_options)
            .await
            .context("Failed to create read pool")?;

        Ok(Self {
            write_pool,
            read_pool,
        })
    }

    pub const fn write_pool(&self) -> &PgPool {
        &self.write_pool
    }

    pub const fn read_pool(&self) -> &PgPool {
        &self.read_pool
    }

    /// # Errors
    /// Returns an error if `DATABASE_URL` is unset/malformed or either pool fails to connect.
    pub async fn from_env() -> Result<Self> {
        let db_config = DatabaseConfig::from_env();
        Self::new(&db_config, PoolConfig::default()).await
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            write_pool: ConnectionStats {
                size: self.write_pool.size(),
                idle: self.write_pool.num_idle().saturating_cast(),
                max: self.write_pool.options().get_max_connections(),
            },
            read_pool: ConnectionStats {
                size: self.read_pool.size(),
                idle: self.read_pool.num_idle().saturating_cast(),
                max: self.read_pool.options().get_max_connections(),
            },
        }
    }

    pub async fn close(&self) {
        self.write_pool.close().await;
        self.read_pool.close().await;
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub size: u32,
    pub idle: u32,
    pub max: u32,
}

#[derive(Debug, Clone)]
pub struct PoolStats {
    pub write_pool: ConnectionStats,
    pub read_pool: ConnectionStats,
}

impl PoolStats {
    pub const fn total_connections(&self) -> u32 {
        self.write_pool.size.saturating_add(self.read_pool.size)
    }

    pub const fn total_idle(&self) -> u32 {
        self.write_pool.idle.saturating_add(self.read_pool.idle)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f32 {
        let total = self.total_connections() as f32;
        let idle = self.total_idle() as f32;
        if total > 0.0 {
            ((total - idle) / total) * 100.0
        } else {
            0.0
        }
    }
}
