// Migration orchestrator: Diesel (PostgreSQL) schema + ClickHouse analytics schema.
// Embedded in the application binary so a single binary deploy can bootstrap state.

pub mod clickhouse;
pub mod diesel;

use std::error::Error;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub skip_diesel: bool,
    pub skip_clickhouse: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            skip_diesel: false,
            skip_clickhouse: false,
        }
    }
}

pub async fn run_all_migrations(
    database_url: &str,
    config: MigrationConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut applied = 0;

    if !config.skip_diesel {
        applied += diesel::run_migrations(database_url).await?;
    }

    if !config.skip_clickhouse {
        applied += clickhouse::run_migrations().await?;
    }

    info!("[MIGRATIONS] migration process complete, {} applied", applied);
    Ok(())
}

pub fn should_run_migrations() -> bool {
    !crate::app_config::config().is_production()
        || std::env::var("RUN_MIGRATIONS_IN_PRODUCTION").is_ok()
}
