// Application state shared across handlers.

use std::sync::Arc;

use crate::app_config::AppConfig;
use crate::cache::{L1Cache, L2Cache};
use crate::db::{ClickHouseClient, DieselPool, RedisPool};
use crate::services::{
    BotClassifier, ClickEventPool, ClickPipeline, Enricher, LinkResolver, RealtimeHub,
    RequestContextPool, WebhookDispatcher,
};
use crate::store::{LinkStore, WorkspaceStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub clickhouse: Arc<ClickHouseClient>,

    pub link_store: Arc<dyn LinkStore>,
    pub workspace_store: Arc<dyn WorkspaceStore>,

    pub l1_cache: Arc<L1Cache>,
    pub l2_cache: Arc<L2Cache>,
    pub resolver: Arc<LinkResolver>,

    pub bot_classifier: Arc<BotClassifier>,
    pub enricher: Arc<Enricher>,
    pub event_pool: Arc<ClickEventPool>,
    pub context_pool: Arc<RequestContextPool>,
    pub pipeline: Arc<ClickPipeline>,

    pub realtime_hub: Arc<RealtimeHub>,
    pub webhook_dispatcher: Arc<WebhookDispatcher>,

    pub max_connections: u32,
}
