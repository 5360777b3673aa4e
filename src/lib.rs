// Library exports for the redirect core: a two-tier cached redirect hot
// path, click pipeline, realtime hub, and webhook dispatcher.

pub mod app;
pub mod app_config;
pub mod cache;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod store;
pub mod utils;

pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{DieselPool, RedisConfig, RedisPool};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use cache::{L1Cache, L2Cache};
use db::{create_clickhouse_client, create_diesel_pool, DieselDatabaseConfig};
use services::enrichment::GeoDatabase;
use services::{
    BotClassifier, ClickEventPool, ClickPipeline, ClickPipelineConfig, Enricher, LinkResolver,
    Pool, RealtimeHub, WebhookDispatcher, WebhookDispatcherConfig,
};
use store::{LinkStore, PgLinkStore, PgWorkspaceStore, WorkspaceStore};

/// Builds every collaborator and wires them into a single `AppState`:
/// config, pools, migrations, then services, in that order.
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = app_config::config();

    info!("Initializing database pool...");
    let db_config = DieselDatabaseConfig::default();
    let max_connections = db_config.max_connections;
    let diesel_pool = create_diesel_pool(db_config).await?;

    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        let migration_config = migrations::MigrationConfig::default();
        migrations::run_all_migrations(&config.database_url, migration_config)
            .await
            .map_err(|e| format!("migration failed: {e}"))?;
    }

    info!("Initializing Redis pool...");
    let redis_config = RedisConfig::from_env();
    let redis_pool = RedisPool::new(redis_config).await?;

    let clickhouse = create_clickhouse_client();

    let link_store: Arc<dyn LinkStore> = Arc::new(PgLinkStore::new(diesel_pool.clone()));
    let workspace_store: Arc<dyn WorkspaceStore> = Arc::new(PgWorkspaceStore::new(diesel_pool.clone()));

    let l1_cache = Arc::new(L1Cache::new(
        config.cache.l1_shards,
        config.cache.l1_max_bytes,
        config.cache.l1_ttl(),
        config.cache.l1_max_entry_bytes,
    ));
    let l2_cache = Arc::new(L2Cache::new(
        redis_pool.clone(),
        config.cache.l2_ttl(),
        config.redis.invalidation_channel.clone(),
    ));
    l2_cache.spawn_invalidation_listener(l1_cache.clone());

    let resolver = Arc::new(LinkResolver::new(
        l1_cache.clone(),
        l2_cache.clone(),
        link_store.clone(),
        workspace_store.clone(),
    ));

    let bot_classifier = Arc::new(BotClassifier::new(config.bot.cache_size, config.bot.min_ua_length));
    let enricher = Arc::new(Enricher::new(GeoDatabase::empty()));
    let event_pool: Arc<ClickEventPool> = Arc::new(Pool::new(config.pipeline.buffer));
    let context_pool = Arc::new(Pool::new(config.pipeline.buffer));

    let realtime_hub = Arc::new(RealtimeHub::spawn(config.realtime.subscriber_buffer));

    let webhook_dispatcher = Arc::new(WebhookDispatcher::spawn(
        diesel_pool.clone(),
        WebhookDispatcherConfig {
            max_attempts: config.webhook.max_attempts,
            initial_delay: config.webhook.initial_delay(),
            multiplier: config.webhook.multiplier,
            max_delay: config.webhook.max_delay(),
            retry_poll_interval: Duration::from_secs(10),
        },
    ));

    let pipeline = Arc::new(ClickPipeline::spawn(
        ClickPipelineConfig {
            workers: config.pipeline.workers,
            buffer: config.pipeline.buffer,
            batch_size: config.pipeline.batch_size,
            flush_period: config.pipeline.flush_period(),
            write_timeout: config.pipeline.write_timeout(),
        },
        clickhouse.clone(),
        enricher.clone(),
        event_pool.clone(),
        redis_pool.clone(),
        realtime_hub.clone(),
        webhook_dispatcher.clone(),
    ));

    let sweep_l1 = l1_cache.clone();
    let sweep_interval = config.cache.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let reclaimed = sweep_l1.sweep();
            if reclaimed > 0 {
                info!("l1 cache sweep reclaimed {} expired entries", reclaimed);
            }
        }
    });

    Ok(AppState {
        config: Arc::new(config.clone()),
        diesel_pool,
        redis_pool,
        clickhouse,
        link_store,
        workspace_store,
        l1_cache,
        l2_cache,
        resolver,
        bot_classifier,
        enricher,
        event_pool,
        context_pool,
        pipeline,
        realtime_hub,
        webhook_dispatcher,
        max_connections,
    })
}
