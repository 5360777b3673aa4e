// L2 shared cache: Redis-backed, same triad contract as L1,
// plus cross-node invalidation over pub/sub so every node's L1 stays bounded
// in staleness by publish latency rather than by L2's own TTL.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::encoding;
use crate::cache::l1::L1Cache;
use crate::db::redis_pool::RedisPool;
use crate::models::cache_entry::CacheEntry;

pub struct L2Cache {
    redis: RedisPool,
    ttl: Duration,
    invalidation_channel: String,
}

impl L2Cache {
    pub fn new(redis: RedisPool, ttl: Duration, invalidation_channel: String) -> Self {
        Self {
            redis,
            ttl,
            invalidation_channel,
        }
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let bytes = match self.redis.get_bytes(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("L2 cache get failed for {}: {}", key, e);
                return None;
            }
        }?;

        match encoding::decode(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("L2 cache entry for {} failed to decode: {}", key, e);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, entry: &CacheEntry) {
        let bytes = encoding::encode(entry);
        if let Err(e) = self.redis.set_ex_bytes(key, bytes, self.ttl).await {
            warn!("L2 cache set failed for {}: {}", key, e);
        }
    }

    /// Deletes the L2 entry and publishes the key on the invalidation channel
    /// so every subscribed node evicts its own L1 copy.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.redis.del(key).await {
            warn!("L2 cache delete failed for {}: {}", key, e);
        }
        if let Err(e) = self
            .redis
            .publish(&self.invalidation_channel, key.as_bytes().to_vec())
            .await
        {
            warn!("L2 invalidation publish failed for {}: {}", key, e);
        }
    }

    /// Runs until the process exits: receives invalidation keys published by
    /// any node (including this one) and evicts the matching L1 entry.
    /// Message loss is tolerable; consistency is eventual and bounded by TTL.
    pub fn spawn_invalidation_listener(&self, l1: Arc<L1Cache>) -> tokio::task::JoinHandle<()> {
        let mut rx = self.redis.subscribe(&self.invalidation_channel);
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Ok(key) = std::str::from_utf8(&payload) {
                    l1.invalidate(key);
                }
            }
        })
    }
}
