//! Testcontainer configurations for integration tests.

use gridiron_db::DatabaseConfig;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

/// PostgreSQL container standing in for the warehouse.
pub struct PostgresContainer {
    #[allow(dead_code)] // Kept to maintain container lifetime
    container: ContainerAsync<Postgres>,
    config: DatabaseConfig,
}

impl PostgresContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Postgres::default().with_tag("16-alpine").start().await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;

        let config = DatabaseConfig {
            host: host.to_string(),
            port,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "postgres".to_string(),
            ..Default::default()
        };

        Ok(Self { container, config })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn connection_string(&self) -> String {
        self.config.url()
    }
}
