// Diesel (PostgreSQL) migration runner.
// diesel-async connections don't implement `MigrationHarness` directly, so we
// run the embedded migrations through a blocking wrapper connection, the
// documented diesel-async pattern for embedding migrations in an async binary.

use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::MigrationHarness;
use std::error::Error;
use tracing::info;

use crate::db::diesel_pool::MIGRATIONS;

pub async fn run_migrations(database_url: &str) -> Result<usize, Box<dyn Error + Send + Sync>> {
    let database_url = database_url.to_string();

    let applied = tokio::task::spawn_blocking(move || -> Result<usize, Box<dyn Error + Send + Sync>> {
        let mut conn: AsyncConnectionWrapper<diesel_async::AsyncPgConnection> =
            AsyncConnectionWrapper::establish(&database_url)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| -> Box<dyn Error + Send + Sync> { e })?;
        Ok(applied.len())
    })
    .await??;

    info!("[MIGRATIONS] Applied {} Diesel migrations", applied);
    Ok(applied)
}
