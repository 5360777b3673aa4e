// Click pipeline: ingest -> enrich -> batch -> write, plus a parallel
// realtime-counters consumer. Built around an mpsc-batching pattern, with a
// pool of independent workers each owning a shard of the ingest channel.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clickhouse::Row;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{ClickHouseClient, RedisPool};
use crate::models::click_event::ClickEvent;
use crate::services::enrichment::Enricher;
use crate::services::event_pool::ClickEventPool;
use crate::services::realtime_hub::RealtimeHub;
use crate::services::webhook_dispatcher::WebhookDispatcher;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub ingested: AtomicU64,
    pub dropped_producer: AtomicU64,
    pub written: AtomicU64,
    pub write_failures: AtomicU64,
}

#[derive(Row, Serialize)]
struct ClickEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    event_id: Uuid,
    #[serde(with = "clickhouse::serde::uuid")]
    link_id: Uuid,
    short_code: String,
    #[serde(with = "clickhouse::serde::uuid")]
    workspace_id: Uuid,
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    event_time: chrono::DateTime<chrono::Utc>,
    ip_address: String,
    user_agent: String,
    referer: String,
    referer_host: String,
    country: String,
    country_code: [u8; 2],
    city: String,
    latitude: f64,
    longitude: f64,
    timezone: String,
    device_type: String,
    browser: String,
    os: String,
    is_bot: u8,
    is_unique: u8,
    utm_source: String,
    utm_medium: String,
    utm_campaign: String,
}

impl From<&ClickEvent> for ClickEventRow {
    fn from(event: &ClickEvent) -> Self {
        let mut country_code = [b' '; 2];
        for (slot, byte) in country_code.iter_mut().zip(event.country_code.bytes()) {
            *slot = byte;
        }

        Self {
            event_id: event.event_id,
            link_id: event.link_id,
            short_code: event.short_code.clone(),
            workspace_id: event.workspace_id,
            event_time: event.timestamp,
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            referer: event.referer.clone(),
            referer_host: event.referer_host.clone(),
            country: event.country.clone(),
            country_code,
            city: event.city.clone(),
            latitude: event.latitude,
            longitude: event.longitude,
            timezone: event.timezone.clone(),
            device_type: event.device_type.as_str().to_string(),
            browser: event.browser.clone(),
            os: event.os.clone(),
            is_bot: event.is_bot as u8,
            is_unique: event.is_unique as u8,
            utm_source: event.utm_source.clone(),
            utm_medium: event.utm_medium.clone(),
            utm_campaign: event.utm_campaign.clone(),
        }
    }
}

/// Counter buckets flushed periodically to the shared cache. Keys are
/// pre-formatted strings so the flusher can write them directly as cache
/// keys without re-deriving them.
#[derive(Default)]
struct CounterBuckets {
    minute: HashMap<String, u64>,
    hour: HashMap<String, u64>,
    country_day: HashMap<String, u64>,
    device_day: HashMap<String, u64>,
    referer_day: HashMap<String, u64>,
}

impl CounterBuckets {
    /// Flush every bucket to the shared cache as an atomic increment with a
    /// TTL matching its window, then clear the in-memory accumulation.
    async fn flush(&mut self, redis: &RedisPool) {
        flush_window(redis, &mut self.minute, "rt:min", Duration::from_secs(3600)).await;
        flush_window(redis, &mut self.hour, "rt:hour", Duration::from_secs(86_400)).await;
        flush_window(redis, &mut self.country_day, "rt:country", Duration::from_secs(2 * 86_400)).await;
        flush_window(redis, &mut self.device_day, "rt:device", Duration::from_secs(2 * 86_400)).await;
        flush_window(redis, &mut self.referer_day, "rt:referer", Duration::from_secs(2 * 86_400)).await;
    }

    fn record(&mut self, event: &ClickEvent) {
        let now = event.timestamp;
        *self
            .minute
            .entry(format!("{}:{}", event.workspace_id, now.format("%Y%m%d%H%M")))
            .or_insert(0) += 1;
        *self
            .hour
            .entry(format!("{}:{}", event.workspace_id, now.format("%Y%m%d%H")))
            .or_insert(0) += 1;
        *self
            .country_day
            .entry(format!(
                "{}:{}:{}",
                event.workspace_id,
                event.country_code,
                now.format("%Y%m%d")
            ))
            .or_insert(0) += 1;
        *self
            .device_day
            .entry(format!(
                "{}:{}:{}",
                event.workspace_id,
                event.device_type.as_str(),
                now.format("%Y%m%d")
            ))
            .or_insert(0) += 1;
        *self
            .referer_day
            .entry(format!(
                "{}:{}:{}",
                event.workspace_id,
                event.referer_host,
                now.format("%Y%m%d")
            ))
            .or_insert(0) += 1;
    }
}

async fn flush_window(redis: &RedisPool, bucket: &mut HashMap<String, u64>, prefix: &str, ttl: Duration) {
    if bucket.is_empty() {
        return;
    }
    for (suffix, delta) in bucket.drain() {
        let key = format!("{prefix}:{suffix}");
        if let Err(e) = redis.incr(&key, delta as i64).await {
            warn!("realtime counter flush failed for {}: {}", key, e);
            continue;
        }
        if let Err(e) = redis.expire(&key, ttl).await {
            warn!("realtime counter expire failed for {}: {}", key, e);
        }
    }
}

pub struct ClickPipelineConfig {
    pub workers: usize,
    pub buffer: usize,
    pub batch_size: usize,
    pub flush_period: Duration,
    pub write_timeout: Duration,
}

pub struct ClickPipeline {
    senders: Vec<mpsc::Sender<ClickEvent>>,
    metrics: Arc<PipelineMetrics>,
}

impl ClickPipeline {
    pub fn spawn(
        config: ClickPipelineConfig,
        clickhouse: Arc<ClickHouseClient>,
        enricher: Arc<Enricher>,
        pool: Arc<ClickEventPool>,
        redis: RedisPool,
        realtime: Arc<RealtimeHub>,
        webhook_dispatcher: Arc<WebhookDispatcher>,
    ) -> Self {
        let metrics = Arc::new(PipelineMetrics::default());
        let per_worker_buffer = (config.buffer / config.workers.max(1)).max(1);
        let mut senders = Vec::with_capacity(config.workers);

        for worker_id in 0..config.workers {
            let (tx, rx) = mpsc::channel(per_worker_buffer);
            senders.push(tx);

            let clickhouse = clickhouse.clone();
            let enricher = enricher.clone();
            let pool = pool.clone();
            let metrics = metrics.clone();
            let redis = redis.clone();
            let realtime = realtime.clone();
            let webhook_dispatcher = webhook_dispatcher.clone();
            let batch_size = config.batch_size;
            let flush_period = config.flush_period;
            let write_timeout = config.write_timeout;

            tokio::spawn(async move {
                run_worker(
                    worker_id,
                    rx,
                    clickhouse,
                    enricher,
                    pool,
                    redis,
                    realtime,
                    webhook_dispatcher,
                    metrics,
                    batch_size,
                    flush_period,
                    write_timeout,
                )
                .await;
            });
        }

        Self { senders, metrics }
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Non-blocking submit, sharded by `link_id` so same-link events keep
    /// relative order. Channel-full drops the event (drop-newest) and the
    /// caller is expected to return it to the pool.
    pub fn submit(&self, event: ClickEvent) -> Result<(), ClickEvent> {
        self.metrics.ingested.fetch_add(1, Ordering::Relaxed);
        let shard = (event.link_id.as_u128() as usize) % self.senders.len().max(1);
        match self.senders[shard].try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.metrics.dropped_producer.fetch_add(1, Ordering::Relaxed);
                Err(event)
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.metrics.dropped_producer.fetch_add(1, Ordering::Relaxed);
                Err(event)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    worker_id: usize,
    mut rx: mpsc::Receiver<ClickEvent>,
    clickhouse: Arc<ClickHouseClient>,
    enricher: Arc<Enricher>,
    pool: Arc<ClickEventPool>,
    redis: RedisPool,
    realtime: Arc<RealtimeHub>,
    webhook_dispatcher: Arc<WebhookDispatcher>,
    metrics: Arc<PipelineMetrics>,
    batch_size: usize,
    flush_period: Duration,
    write_timeout: Duration,
) {
    let mut batch: Vec<ClickEvent> = Vec::with_capacity(batch_size);
    let mut counters = CounterBuckets::default();
    let mut ticker = tokio::time::interval(flush_period);

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(mut event) => {
                        enrich_event(&enricher, &mut event);
                        counters.record(&event);
                        if event.realtime_enabled {
                            realtime.broadcast_workspace(event.workspace_id, &event).await;
                            realtime.broadcast_link(event.link_id, &event).await;
                        }
                        if event.webhooks_enabled {
                            dispatch_webhook(&webhook_dispatcher, &event).await;
                        }
                        batch.push(event);
                        if batch.len() >= batch_size {
                            flush_batch(worker_id, &clickhouse, &pool, &metrics, &mut batch, write_timeout).await;
                        }
                    }
                    None => {
                        flush_batch(worker_id, &clickhouse, &pool, &metrics, &mut batch, write_timeout).await;
                        counters.flush(&redis).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush_batch(worker_id, &clickhouse, &pool, &metrics, &mut batch, write_timeout).await;
                }
                counters.flush(&redis).await;
            }
        }
    }
}

async fn dispatch_webhook(dispatcher: &WebhookDispatcher, event: &ClickEvent) {
    match serde_json::to_vec(event) {
        Ok(payload) => dispatcher.submit(event.workspace_id, "link.clicked".to_string(), payload).await,
        Err(e) => warn!("failed to serialize click event {} for webhook dispatch: {}", event.event_id, e),
    }
}

fn enrich_event(enricher: &Enricher, event: &mut ClickEvent) {
    let ip: IpAddr = event.ip_address.parse().unwrap_or(IpAddr::from([0, 0, 0, 0]));
    let (geo, device) = enricher.enrich(ip, &event.user_agent);

    event.country = geo.country;
    event.country_code = geo.country_code;
    event.city = geo.city;
    event.latitude = geo.latitude;
    event.longitude = geo.longitude;
    event.timezone = geo.timezone;
    event.device_type = device.device_type;
    event.browser = device.browser;
    event.os = device.os;

    if event.timestamp == chrono::DateTime::<chrono::Utc>::MIN_UTC {
        event.timestamp = chrono::Utc::now();
    }
}

async fn flush_batch(
    worker_id: usize,
    clickhouse: &ClickHouseClient,
    pool: &ClickEventPool,
    metrics: &PipelineMetrics,
    batch: &mut Vec<ClickEvent>,
    write_timeout: Duration,
) {
    if batch.is_empty() {
        return;
    }

    let rows: Vec<ClickEventRow> = batch.iter().map(ClickEventRow::from).collect();
    let count = rows.len();

    let write_result = tokio::time::timeout(write_timeout, write_rows(clickhouse, rows)).await;

    match write_result {
        Ok(Ok(())) => {
            metrics.written.fetch_add(count as u64, Ordering::Relaxed);
            info!("pipeline worker {} wrote {} click events", worker_id, count);
        }
        Ok(Err(e)) => {
            metrics.write_failures.fetch_add(count as u64, Ordering::Relaxed);
            error!("pipeline worker {} write failed for {} events: {}", worker_id, count, e);
        }
        Err(_) => {
            metrics.write_failures.fetch_add(count as u64, Ordering::Relaxed);
            warn!("pipeline worker {} write timed out for {} events", worker_id, count);
        }
    }

    for event in batch.drain(..) {
        pool.release(event);
    }
}

async fn write_rows(
    clickhouse: &ClickHouseClient,
    rows: Vec<ClickEventRow>,
) -> Result<(), clickhouse::error::Error> {
    let mut insert = clickhouse.client().insert("click_events")?;
    for row in &rows {
        insert.write(row).await?;
    }
    insert.end().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_buckets_key_by_workspace_and_window() {
        let mut event = ClickEvent::default();
        event.workspace_id = Uuid::new_v4();
        event.timestamp = chrono::Utc::now();
        event.country_code = "US".to_string();

        let mut buckets = CounterBuckets::default();
        buckets.record(&event);

        assert_eq!(buckets.minute.len(), 1);
        assert_eq!(buckets.hour.len(), 1);
        assert_eq!(buckets.country_day.len(), 1);
    }
}
