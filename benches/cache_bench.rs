use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use redirect_core::cache::{encoding, L1Cache};
use redirect_core::models::cache_entry::CacheEntry;
use redirect_core::models::link::RedirectKind;
use std::time::Duration;
use uuid::Uuid;

fn sample_entry() -> CacheEntry {
    CacheEntry {
        id: Uuid::new_v4(),
        workspace_id: Uuid::new_v4(),
        domain_id: None,
        short_code: "abc123".to_string(),
        destination: "https://example.com/a/very/long/destination/path?utm_source=bench".to_string(),
        redirect_kind: RedirectKind::Permanent,
        expires_at: None,
        disabled: false,
        password_protected: false,
        track_bots: false,
        webhooks_enabled: true,
        realtime_enabled: true,
        platform_overrides: vec![
            ("ios".to_string(), "https://apps.apple.com/app/example".to_string()),
            ("android".to_string(), "https://play.google.com/store/apps/example".to_string()),
        ],
        cached_at: Utc::now(),
    }
}

fn bench_encode(c: &mut Criterion) {
    let entry = sample_entry();

    c.bench_function("cache_entry_encode", |b| {
        b.iter(|| encoding::encode(black_box(&entry)));
    });
}

fn bench_decode(c: &mut Criterion) {
    let entry = sample_entry();
    let bytes = encoding::encode(&entry);

    c.bench_function("cache_entry_decode", |b| {
        b.iter(|| encoding::decode(black_box(&bytes)).unwrap());
    });
}

fn bench_l1_get_hit(c: &mut Criterion) {
    let cache = L1Cache::new(1024, 64 * 1024 * 1024, Duration::from_secs(300), 8192);
    let entry = sample_entry();
    cache.put("default:abc123".to_string(), entry);

    c.bench_function("l1_cache_get_hit", |b| {
        b.iter(|| cache.get(black_box("default:abc123")));
    });
}

fn bench_l1_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("l1_cache_put");
    group.throughput(Throughput::Elements(1));

    for shards in [16usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(shards), &shards, |b, &shards| {
            let cache = L1Cache::new(shards, 64 * 1024 * 1024, Duration::from_secs(300), 8192);
            let entry = sample_entry();
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                cache.put(format!("default:code{}", i), entry.clone());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_l1_get_hit, bench_l1_put);
criterion_main!(benches);
