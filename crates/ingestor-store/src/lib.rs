//! `PostgreSQL`-backed persistence for the ingestion pipeline: jobs, documents, chunks,
//! and embeddings, plus the claim/retry/reaper queue semantics built on top of them.

pub mod error;
pub mod migrations;
pub mod mock;
pub mod models;
pub mod pool;
pub mod pool_manager;
pub mod repository;
pub mod traits;

pub use error::{DatabaseError, DatabaseErrorExt, DatabaseOperation, DatabaseResult};
pub use ingestor_config::DatabaseConfig;
pub use migrations::{run_migrations, wait_for_migrations};
pub use mock::MockStore;
pub use models::*;
pub use pool::{create_pool, initialize_database};
pub use pool_manager::{PoolConfig, PoolManager};
pub use repository::PgStore;
pub use traits::Store;
