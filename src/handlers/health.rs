// Health/metrics surface: per-component status/latency, overall 200/503.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::app::AppState;
use crate::db::check_diesel_health;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    let postgres = match check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({"status": "healthy", "error": null}),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({"status": "unhealthy", "error": e.to_string()})
        }
    };

    let redis_health = state.redis_pool.health_check().await;
    if !redis_health.is_healthy {
        overall_healthy = false;
    }

    let clickhouse = match state.clickhouse.health_check().await {
        Ok(()) => serde_json::json!({"status": "healthy", "error": null}),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({"status": "unhealthy", "error": e.to_string()})
        }
    };

    let body = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "redirect-core",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres,
            "redis": {
                "status": if redis_health.is_healthy { "healthy" } else { "unhealthy" },
                "latency_ms": redis_health.latency_ms,
                "error": redis_health.error,
            },
            "clickhouse": clickhouse,
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(body))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    use prometheus::{Encoder, TextEncoder};

    let resolver_metrics = state.resolver.metrics();
    let pipeline_metrics = state.pipeline.metrics();
    let dispatcher_metrics = state.webhook_dispatcher.metrics();

    let registry = prometheus::Registry::new();
    let gauge_opts = |name: &str, help: &str, value: f64| -> prometheus::Gauge {
        let gauge = prometheus::Gauge::new(name, help).expect("valid metric name");
        gauge.set(value);
        gauge
    };

    use std::sync::atomic::Ordering;

    let gauges = [
        gauge_opts(
            "resolver_l1_hits_total",
            "L1 cache hits",
            resolver_metrics.l1_hits.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "resolver_l2_hits_total",
            "L2 cache hits",
            resolver_metrics.l2_hits.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "resolver_store_hits_total",
            "Authoritative store hits",
            resolver_metrics.store_hits.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "resolver_misses_total",
            "Resolver misses",
            resolver_metrics.misses.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "pipeline_ingested_total",
            "Click events ingested",
            pipeline_metrics.ingested.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "pipeline_dropped_total",
            "Click events dropped at the producer",
            pipeline_metrics.dropped_producer.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "pipeline_written_total",
            "Click events written to the columnar store",
            pipeline_metrics.written.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "webhook_delivered_total",
            "Webhooks delivered",
            dispatcher_metrics.delivered.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "webhook_dead_total",
            "Webhooks marked dead",
            dispatcher_metrics.dead.load(Ordering::Relaxed) as f64,
        ),
        gauge_opts(
            "realtime_dropped_total",
            "Realtime messages dropped for backpressure",
            state.realtime_hub.dropped_count() as f64,
        ),
    ];

    for gauge in &gauges {
        let _ = registry.register(Box::new(gauge.clone()));
    }

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }

    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
