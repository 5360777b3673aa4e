// Webhook dispatcher: signs and delivers events, retrying on
// an in-process time-ordered queue. A multi-node deployment would back the
// queue with the shared cache's sorted-set operations instead (`RedisPool`
// already exposes `zadd`/`zpopmin_by_score` for that upgrade).

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::webhook::{DeliveryStatus, WebhookDelivery, WebhookSubscription};
use crate::schema::webhook_subscriptions;
use crate::utils::hmac_sign;

const AUTO_DISABLE_THRESHOLD: i32 = 10;
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WebhookDispatcherConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub retry_poll_interval: Duration,
}

#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub dead: AtomicU64,
}

pub type OutboundEvent = (Uuid, String, Vec<u8>);

struct RetryItem {
    next_attempt_at: i64,
    delivery: WebhookDelivery,
    subscription: WebhookSubscription,
}

impl PartialEq for RetryItem {
    fn eq(&self, other: &Self) -> bool {
        self.next_attempt_at == other.next_attempt_at
    }
}
impl Eq for RetryItem {}
impl PartialOrd for RetryItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for RetryItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.next_attempt_at.cmp(&other.next_attempt_at)
    }
}

pub struct WebhookDispatcher {
    events_tx: mpsc::Sender<OutboundEvent>,
    metrics: Arc<DispatcherMetrics>,
}

impl WebhookDispatcher {
    pub fn spawn(pool: DieselPool, config: WebhookDispatcherConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(4096);
        let metrics = Arc::new(DispatcherMetrics::default());
        let retry_queue: Arc<Mutex<BinaryHeap<Reverse<RetryItem>>>> =
            Arc::new(Mutex::new(BinaryHeap::new()));
        let http = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .expect("failed to build webhook http client");

        tokio::spawn(run_ingest_loop(
            events_rx,
            pool.clone(),
            http.clone(),
            config.clone(),
            retry_queue.clone(),
            metrics.clone(),
        ));

        tokio::spawn(run_retry_loop(pool, http, config, retry_queue, metrics.clone()));

        Self { events_tx, metrics }
    }

    pub fn metrics(&self) -> Arc<DispatcherMetrics> {
        self.metrics.clone()
    }

    pub async fn submit(&self, workspace_id: Uuid, event_kind: String, payload: Vec<u8>) {
        if self.events_tx.send((workspace_id, event_kind, payload)).await.is_err() {
            error!("webhook dispatcher ingest channel closed");
        }
    }
}

async fn run_ingest_loop(
    mut events_rx: mpsc::Receiver<OutboundEvent>,
    pool: DieselPool,
    http: Client,
    config: WebhookDispatcherConfig,
    retry_queue: Arc<Mutex<BinaryHeap<Reverse<RetryItem>>>>,
    metrics: Arc<DispatcherMetrics>,
) {
    while let Some((workspace_id, event_kind, payload)) = events_rx.recv().await {
        let subscriptions = match active_subscriptions_for(&pool, workspace_id, &event_kind).await {
            Ok(subs) => subs,
            Err(e) => {
                error!("failed to load webhook subscriptions for {}: {}", workspace_id, e);
                continue;
            }
        };

        for subscription in subscriptions {
            let delivery = WebhookDelivery::new(
                subscription.id,
                workspace_id,
                event_kind.clone(),
                payload.clone(),
            );
            attempt_and_reschedule(
                &pool,
                &http,
                &config,
                &retry_queue,
                &metrics,
                subscription,
                delivery,
            )
            .await;
        }
    }
}

async fn run_retry_loop(
    pool: DieselPool,
    http: Client,
    config: WebhookDispatcherConfig,
    retry_queue: Arc<Mutex<BinaryHeap<Reverse<RetryItem>>>>,
    metrics: Arc<DispatcherMetrics>,
) {
    let mut ticker = tokio::time::interval(config.retry_poll_interval);
    loop {
        ticker.tick().await;
        let now = Utc::now().timestamp();

        let due: Vec<RetryItem> = {
            let mut queue = retry_queue.lock().await;
            let mut due = Vec::new();
            while let Some(Reverse(item)) = queue.peek() {
                if item.next_attempt_at > now {
                    break;
                }
                if let Some(Reverse(item)) = queue.pop() {
                    due.push(item);
                }
            }
            due
        };

        for item in due {
            attempt_and_reschedule(
                &pool,
                &http,
                &config,
                &retry_queue,
                &metrics,
                item.subscription,
                item.delivery,
            )
            .await;
        }
    }
}

async fn attempt_and_reschedule(
    pool: &DieselPool,
    http: &Client,
    config: &WebhookDispatcherConfig,
    retry_queue: &Arc<Mutex<BinaryHeap<Reverse<RetryItem>>>>,
    metrics: &DispatcherMetrics,
    subscription: WebhookSubscription,
    mut delivery: WebhookDelivery,
) {
    delivery.attempts += 1;

    match deliver_once(http, &subscription, &delivery).await {
        Ok(()) => {
            delivery.status = DeliveryStatus::Delivered;
            metrics.delivered.fetch_add(1, Ordering::Relaxed);
            info!(
                "webhook delivered: subscription={} event={} attempts={}",
                subscription.id, delivery.event_kind, delivery.attempts
            );
            reset_failure_streak(pool, subscription.id).await;
        }
        Err(reason) => {
            metrics.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                "webhook delivery failed: subscription={} event={} attempts={} reason={}",
                subscription.id, delivery.event_kind, delivery.attempts, reason
            );

            if delivery.attempts >= config.max_attempts {
                delivery.status = DeliveryStatus::Dead;
                metrics.dead.fetch_add(1, Ordering::Relaxed);
                mark_dead(pool, &subscription).await;
            } else {
                delivery.status = DeliveryStatus::Failed;
                let delay = backoff_delay(config, delivery.attempts);
                delivery.next_attempt_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                let mut queue = retry_queue.lock().await;
                queue.push(Reverse(RetryItem {
                    next_attempt_at: delivery.next_attempt_at.timestamp(),
                    delivery,
                    subscription,
                }));
            }
        }
    }
}

fn backoff_delay(config: &WebhookDispatcherConfig, attempt: u32) -> Duration {
    let exponent = (attempt.saturating_sub(1)) as i32;
    let scaled = config.initial_delay.as_secs_f64() * config.multiplier.powi(exponent);
    Duration::from_secs_f64(scaled.min(config.max_delay.as_secs_f64()))
}

async fn deliver_once(
    http: &Client,
    subscription: &WebhookSubscription,
    delivery: &WebhookDelivery,
) -> Result<(), String> {
    let timestamp = Utc::now().timestamp();
    let signature = hmac_sign(&subscription.secret, timestamp, &delivery.payload);

    let response = http
        .post(&subscription.url)
        .header("Content-Type", "application/json")
        .header("X-Event", &delivery.event_kind)
        .header("X-Delivery", delivery.id.to_string())
        .header("X-Signature", format!("v1={signature}"))
        .header("X-Timestamp", timestamp.to_string())
        .body(delivery.payload.clone())
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("http status {}", response.status()))
    }
}

async fn active_subscriptions_for(
    pool: &DieselPool,
    workspace_id: Uuid,
    event_kind: &str,
) -> Result<Vec<WebhookSubscription>, diesel::result::Error> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| diesel::result::Error::QueryBuilderError(e.into()))?;

    let subs = webhook_subscriptions::table
        .filter(webhook_subscriptions::workspace_id.eq(workspace_id))
        .filter(webhook_subscriptions::active.eq(true))
        .select(WebhookSubscription::as_select())
        .load::<WebhookSubscription>(&mut conn)
        .await?;

    Ok(subs.into_iter().filter(|s| s.subscribes_to(event_kind)).collect())
}

async fn reset_failure_streak(pool: &DieselPool, subscription_id: Uuid) {
    let Ok(mut conn) = pool.get().await else {
        return;
    };
    let _ = diesel::update(webhook_subscriptions::table.find(subscription_id))
        .set(webhook_subscriptions::failure_streak.eq(0))
        .execute(&mut conn)
        .await;
}

async fn mark_dead(pool: &DieselPool, subscription: &WebhookSubscription) {
    let Ok(mut conn) = pool.get().await else {
        return;
    };
    let new_streak = subscription.failure_streak + 1;
    let disable = new_streak >= AUTO_DISABLE_THRESHOLD;

    let result = diesel::update(webhook_subscriptions::table.find(subscription.id))
        .set((
            webhook_subscriptions::failure_streak.eq(new_streak),
            webhook_subscriptions::active.eq(!disable),
        ))
        .execute(&mut conn)
        .await;

    if let Err(e) = result {
        error!("failed to update webhook subscription {}: {}", subscription.id, e);
    } else if disable {
        warn!("auto-disabled webhook subscription {} after {} failures", subscription.id, new_streak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WebhookDispatcherConfig {
        WebhookDispatcherConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_delay: Duration::from_secs(86_400),
            retry_poll_interval: Duration::from_secs(10),
        }
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let cfg = config();
        let mut previous = Duration::from_secs(0);
        for attempt in 1..=8 {
            let delay = backoff_delay(&cfg, attempt);
            assert!(delay >= previous || delay == cfg.max_delay);
            assert!(delay <= cfg.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn first_attempt_uses_initial_delay() {
        let cfg = config();
        assert_eq!(backoff_delay(&cfg, 1), cfg.initial_delay);
    }
}
