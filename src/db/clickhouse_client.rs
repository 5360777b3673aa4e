// ClickHouse client configuration and connection management.
// The columnar analytics store backing the click pipeline's writer stage.

use clickhouse::Client;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ClickHouseClient {
    client: Client,
    database: String,
}

impl ClickHouseClient {
    pub fn from_config() -> Self {
        let config = crate::app_config::config();

        let client = Client::default()
            .with_url(&config.clickhouse.url)
            .with_database(&config.clickhouse.database)
            .with_user(&config.clickhouse.user)
            .with_password(&config.clickhouse.password);

        info!(
            "ClickHouse client initialized for database: {}",
            config.clickhouse.database
        );

        Self {
            client,
            database: config.clickhouse.database.clone(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn health_check(&self) -> Result<(), clickhouse::error::Error> {
        self.client.query("SELECT 1").fetch_one::<u8>().await?;
        Ok(())
    }
}

pub fn create_clickhouse_client() -> Arc<ClickHouseClient> {
    Arc::new(ClickHouseClient::from_config())
}
