//! Test context providing a live warehouse.

use crate::containers::PostgresContainer;
use gridiron_db::{Database, PgWarehouse};

/// PostgreSQL container plus a connected warehouse.
///
/// Drop this to stop the container.
pub struct TestContext {
    pub postgres: PostgresContainer,
    pub db: Database,
    pub warehouse: PgWarehouse,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        crate::init_test_logging();

        let postgres = PostgresContainer::start().await?;
        let db = Database::connect(postgres.config()).await?;
        let warehouse = db.warehouse();

        Ok(Self {
            postgres,
            db,
            warehouse,
        })
    }

    /// Get database connection string.
    pub fn db_url(&self) -> String {
        self.postgres.connection_string()
    }
}
