//! Postgres connection pool construction (spec §5: `db_pool_size`,
//! `db_max_overflow`, `db_pool_recycle`, pre-ping on checkout), grounded in
//! the teacher's `PostgresClient::new` (`storage::postgres`) but extended
//! with the pool-sizing knobs the spec calls for.

use std::time::Duration;

use docvector_common::error::{DocVectorError, Result};
use sqlx::postgres::{PgPoolOptions, PgPool};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub max_overflow: u32,
    pub recycle_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            max_overflow: 5,
            recycle_secs: 1800,
        }
    }
}

/// Open a pool against `database_url`. `max_overflow` is folded into
/// `max_connections` (sqlx has one pool-size knob, unlike SQLAlchemy's
/// separate overflow pool); `pre-ping` is `test_before_acquire(true)`.
pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections + config.max_overflow)
        .max_lifetime(Duration::from_secs(config.recycle_secs))
        .test_before_acquire(true)
        .connect(database_url)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))
}

/// Run the crate's embedded migrations against `pool`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))
}
