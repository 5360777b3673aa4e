// Common test utilities shared across integration tests: an in-memory
// LinkStore/WorkspaceStore pair and a router builder wired the same way
// `initialize_app_state` wires the real one, minus the authoritative stores.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
    Router,
};
use redirect_core::app::AppState;
use redirect_core::cache::{L1Cache, L2Cache};
use redirect_core::db::{create_clickhouse_client, create_diesel_pool, DieselDatabaseConfig, RedisConfig, RedisPool};
use redirect_core::models::{Link, WorkspaceSettings};
use redirect_core::services::{
    BotClassifier, ClickPipeline, ClickPipelineConfig, Enricher, GeoDatabase, LinkResolver, Pool,
    RealtimeHub, WebhookDispatcher, WebhookDispatcherConfig,
};
use redirect_core::store::{LinkStore, WorkspaceStore};
use redirect_core::utils::ResolveError;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;
use uuid::Uuid;

/// In-memory stand-in for the authoritative Postgres-backed link store.
#[derive(Default)]
pub struct FakeLinkStore {
    links: Mutex<HashMap<(Option<Uuid>, String), Link>>,
}

impl FakeLinkStore {
    pub fn insert(&self, link: Link) {
        self.links
            .lock()
            .expect("fake link store lock poisoned")
            .insert((link.domain_id, link.short_code.clone()), link);
    }
}

#[async_trait]
impl LinkStore for FakeLinkStore {
    async fn find_by_code(
        &self,
        domain_id: Option<Uuid>,
        short_code: &str,
    ) -> Result<Option<Link>, ResolveError> {
        Ok(self
            .links
            .lock()
            .expect("fake link store lock poisoned")
            .get(&(domain_id, short_code.to_string()))
            .cloned())
    }
}

/// In-memory stand-in for the authoritative Postgres-backed workspace store.
#[derive(Default)]
pub struct FakeWorkspaceStore {
    workspaces: Mutex<HashMap<Uuid, WorkspaceSettings>>,
}

impl FakeWorkspaceStore {
    pub fn insert(&self, workspace: WorkspaceSettings) {
        self.workspaces
            .lock()
            .expect("fake workspace store lock poisoned")
            .insert(workspace.id, workspace);
    }
}

#[async_trait]
impl WorkspaceStore for FakeWorkspaceStore {
    async fn get(&self, workspace_id: Uuid) -> Result<Option<WorkspaceSettings>, ResolveError> {
        Ok(self
            .workspaces
            .lock()
            .expect("fake workspace store lock poisoned")
            .get(&workspace_id)
            .cloned())
    }
}

pub fn test_link(short_code: &str, destination: &str) -> Link {
    let now = chrono::Utc::now();
    Link {
        id: Uuid::new_v4(),
        workspace_id: Uuid::new_v4(),
        domain_id: None,
        short_code: short_code.to_string(),
        destination: destination.to_string(),
        redirect_kind: 0,
        expires_at: None,
        disabled: false,
        password_hash: None,
        track_bots: Some(false),
        platform_overrides: None,
        created_at: now,
        updated_at: now,
    }
}

/// Test application wrapper: a real router over fake authoritative stores,
/// with the link store exposed so tests can seed fixtures.
pub struct TestApp {
    pub app: Router,
    pub link_store: Arc<FakeLinkStore>,
}

impl TestApp {
    pub fn get(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, uri)
    }
}

pub struct TestRequest<'a> {
    app: &'a TestApp,
    request: Request<Body>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, uri: &str) -> Self {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        Self { app, request }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.request
            .headers_mut()
            .insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        self
    }

    pub async fn send(mut self) -> TestResponse {
        self.request
            .extensions_mut()
            .insert(ConnectInfo("127.0.0.1:12345".parse::<SocketAddr>().unwrap()));
        let response = self.app.app.clone().oneshot(self.request).await.unwrap();
        TestResponse { response }
    }
}

pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.headers().get(name)?.to_str().ok()
    }
}

/// Builds a redirect-core router against fake authoritative stores but real
/// Postgres/Redis/ClickHouse connections, mirroring `initialize_app_state`.
/// Requires docker-compose services for Postgres/Redis/ClickHouse to be running.
pub async fn setup_test_app() -> TestApp {
    dotenv::from_filename(".env.test").ok();
    let config = redirect_core::app_config::config();

    let diesel_pool = create_diesel_pool(DieselDatabaseConfig::default())
        .await
        .expect("failed to create test diesel pool");
    let redis_pool = RedisPool::new(RedisConfig::from_env())
        .await
        .expect("failed to create test redis pool");
    let clickhouse = create_clickhouse_client();

    let link_store = Arc::new(FakeLinkStore::default());
    let workspace_store: Arc<dyn WorkspaceStore> = Arc::new(FakeWorkspaceStore::default());

    let l1_cache = Arc::new(L1Cache::new(16, 16 * 1024 * 1024, Duration::from_secs(30), 8192));
    let l2_cache = Arc::new(L2Cache::new(
        redis_pool.clone(),
        Duration::from_secs(60),
        format!("test:link:invalidate:{}", Uuid::new_v4()),
    ));
    l2_cache.spawn_invalidation_listener(l1_cache.clone());

    let link_store_dyn: Arc<dyn LinkStore> = link_store.clone();
    let resolver = Arc::new(LinkResolver::new(
        l1_cache.clone(),
        l2_cache.clone(),
        link_store_dyn,
        workspace_store.clone(),
    ));

    let bot_classifier = Arc::new(BotClassifier::new(10_000, 20));
    let enricher = Arc::new(Enricher::new(GeoDatabase::empty()));
    let event_pool = Arc::new(Pool::new(64));
    let context_pool = Arc::new(Pool::new(64));
    let realtime_hub = Arc::new(RealtimeHub::spawn(32));

    let webhook_dispatcher = Arc::new(WebhookDispatcher::spawn(
        diesel_pool.clone(),
        WebhookDispatcherConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            multiplier: 2.0,
            max_delay: Duration::from_secs(1),
            retry_poll_interval: Duration::from_millis(100),
        },
    ));

    let pipeline = Arc::new(ClickPipeline::spawn(
        ClickPipelineConfig {
            workers: 2,
            buffer: 256,
            batch_size: 16,
            flush_period: Duration::from_millis(200),
            write_timeout: Duration::from_secs(5),
        },
        clickhouse.clone(),
        enricher.clone(),
        event_pool.clone(),
        redis_pool.clone(),
        realtime_hub.clone(),
        webhook_dispatcher.clone(),
    ));

    let app_state = AppState {
        config: Arc::new(config.clone()),
        diesel_pool: diesel_pool.clone(),
        redis_pool: redis_pool.clone(),
        clickhouse,
        link_store: link_store.clone(),
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
        max_connections: config.database.max_connections,
    };

    let app = Router::new()
        .merge(redirect_core::handlers::ambient_routes())
        .merge(redirect_core::handlers::redirect_routes())
        .with_state(app_state);

    TestApp { app, link_store }
}
