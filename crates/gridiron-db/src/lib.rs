//! Warehouse adapters for Gridiron Data Hub.

pub mod config;
pub mod error;
pub mod memory;
pub mod sql;
pub mod warehouse;

pub use config::DatabaseConfig;
pub use error::map_sqlx_error;
pub use memory::MemoryWarehouse;
pub use warehouse::{PgTransaction, PgWarehouse};

use gridiron_core::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url())
            .await
            .map_err(map_sqlx_error)?;

        info!(url = %config.redacted_url(), "Connected to warehouse");
        Ok(Self { pool })
    }

    /// Build from an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn warehouse(&self) -> PgWarehouse {
        PgWarehouse::new(self.pool.clone())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
