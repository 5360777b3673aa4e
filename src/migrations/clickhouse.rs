// ClickHouse migration runner: embedded SQL, executed over the HTTP interface.

use reqwest::Client;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, warn};

const MIGRATION_001: (&str, &str) = (
    "001_click_events",
    include_str!("../../migrations/clickhouse/001_click_events.sql"),
);

const MIGRATIONS: &[(&str, &str)] = &[MIGRATION_001];

#[derive(Debug, Clone)]
pub struct ClickHouseMigrationConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ClickHouseMigrationConfig {
    fn default() -> Self {
        let config = crate::app_config::config();
        Self {
            url: config.clickhouse.url.clone(),
            database: config.clickhouse.database.clone(),
            user: config.clickhouse.user.clone(),
            password: config.clickhouse.password.clone(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

pub async fn run_migrations() -> Result<usize, Box<dyn Error + Send + Sync>> {
    info!("[CLICKHOUSE] Starting ClickHouse migration process...");

    let config = ClickHouseMigrationConfig::default();
    let client = Client::new();

    wait_for_clickhouse(&client, &config).await?;
    create_database_if_not_exists(&client, &config).await?;
    setup_migration_tracking(&client, &config).await?;

    let applied_migrations = get_applied_migrations(&client, &config).await?;
    debug!(
        "[CLICKHOUSE] Found {} previously applied migrations",
        applied_migrations.len()
    );

    let mut applied_count = 0;
    for (name, sql) in MIGRATIONS {
        if applied_migrations.contains(&name.to_string()) {
            debug!("[CLICKHOUSE] Migration {} already applied, skipping", name);
            continue;
        }

        info!("[CLICKHOUSE] Applying migration: {}", name);
        apply_migration(&client, &config, name, sql).await?;
        applied_count += 1;
    }

    info!(
        "[CLICKHOUSE] Applied {} ClickHouse migrations",
        applied_count
    );
    Ok(applied_count)
}

async fn wait_for_clickhouse(
    client: &Client,
    config: &ClickHouseMigrationConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    for attempt in 1..=config.max_retries {
        match check_clickhouse_health(client, config).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt == config.max_retries => {
                return Err(format!(
                    "ClickHouse not ready after {} attempts: {}",
                    config.max_retries, e
                )
                .into());
            }
            Err(e) => {
                warn!(
                    "[CLICKHOUSE] not ready (attempt {}/{}): {}",
                    attempt, config.max_retries, e
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
    Err("ClickHouse readiness check exceeded max attempts".into())
}

async fn check_clickhouse_health(
    client: &Client,
    config: &ClickHouseMigrationConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let response = client
        .get(format!("{}/ping", config.url))
        .timeout(config.timeout)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(format!("ClickHouse ping failed with status: {}", response.status()).into());
    }
    Ok(())
}

async fn create_database_if_not_exists(
    client: &Client,
    config: &ClickHouseMigrationConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let sql = format!("CREATE DATABASE IF NOT EXISTS {}", config.database);
    let url = format!("{}/", config.url);

    let mut request = client.post(&url).timeout(config.timeout).body(sql);
    if !config.user.is_empty() {
        request = request.basic_auth(&config.user, Some(&config.password));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Failed to create database {}: {}", config.database, body).into());
    }
    Ok(())
}

async fn setup_migration_tracking(
    client: &Client,
    config: &ClickHouseMigrationConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {}.schema_migrations (version String, applied_at DateTime DEFAULT now()) ENGINE = MergeTree() ORDER BY version",
        config.database
    );
    execute_sql(client, config, &sql).await
}

async fn get_applied_migrations(
    client: &Client,
    config: &ClickHouseMigrationConfig,
) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
    let query = format!(
        "SELECT version FROM {}.schema_migrations ORDER BY version",
        config.database
    );
    match execute_query(client, config, &query).await {
        Ok(response) => Ok(response
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
            .collect()),
        Err(_) => Ok(vec![]),
    }
}

async fn apply_migration(
    client: &Client,
    config: &ClickHouseMigrationConfig,
    name: &str,
    sql: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    execute_sql(client, config, sql).await?;

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(format!("Invalid migration name: {}", name).into());
    }
    let record_sql = format!(
        "INSERT INTO `{}`.schema_migrations (version) VALUES ('{}')",
        config.database, name
    );
    execute_sql(client, config, &record_sql).await?;

    info!("[CLICKHOUSE] Migration {} completed", name);
    Ok(())
}

async fn execute_query(
    client: &Client,
    config: &ClickHouseMigrationConfig,
    sql: &str,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut url = format!("{}/", config.url);
    if !config.database.is_empty() {
        url.push_str(&format!("?database={}", config.database));
    }

    let mut request = client.post(&url).timeout(config.timeout).body(sql.to_string());
    if !config.user.is_empty() {
        request = request.basic_auth(&config.user, Some(&config.password));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("ClickHouse query failed: {}", body).into());
    }
    Ok(response.text().await?)
}

async fn execute_sql(
    client: &Client,
    config: &ClickHouseMigrationConfig,
    sql: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    execute_query(client, config, sql).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_names_are_well_formed() {
        for (name, _) in MIGRATIONS {
            assert!(name.chars().all(|c| c.is_alphanumeric() || c == '_'));
        }
    }
}
