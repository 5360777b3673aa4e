// L1 in-process cache: sharded, per-shard RW lock, ring-buffer
// admission order plus a HashMap index. Readers never block other readers;
// writers only ever block within a single shard.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::models::cache_entry::CacheEntry;

struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
    size_bytes: usize,
}

struct Shard {
    index: HashMap<String, Slot>,
    order: VecDeque<String>,
    bytes_used: usize,
}

impl Shard {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            order: VecDeque::new(),
            bytes_used: 0,
        }
    }
}

pub struct L1Cache {
    shards: Vec<RwLock<Shard>>,
    shard_mask: usize,
    ttl: Duration,
    max_bytes_per_shard: usize,
    max_entry_bytes: usize,
}

fn estimated_size(entry: &CacheEntry) -> usize {
    let mut size = std::mem::size_of::<CacheEntry>();
    size += entry.short_code.len();
    size += entry.destination.len();
    for (k, v) in &entry.platform_overrides {
        size += k.len() + v.len();
    }
    size
}

fn shard_index(key: &str, mask: usize) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash as usize) & mask
}

impl L1Cache {
    /// `shards` is rounded up to the next power of two.
    pub fn new(shards: usize, max_bytes: u64, ttl: Duration, max_entry_bytes: usize) -> Self {
        let shard_count = shards.max(1).next_power_of_two();
        let mut shard_vec = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shard_vec.push(RwLock::new(Shard::new()));
        }
        let max_bytes_per_shard = ((max_bytes as usize) / shard_count).max(max_entry_bytes);

        Self {
            shards: shard_vec,
            shard_mask: shard_count - 1,
            ttl,
            max_bytes_per_shard,
            max_entry_bytes,
        }
    }

    fn shard_for(&self, key: &str) -> &RwLock<Shard> {
        &self.shards[shard_index(key, self.shard_mask)]
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let shard = self.shard_for(key).read().expect("l1 shard lock poisoned");
        let slot = shard.index.get(key)?;
        if slot.expires_at <= Instant::now() {
            return None;
        }
        Some(slot.entry.clone())
    }

    /// Admission is unconditional on a resolver miss: callers always write
    /// through regardless of whether this key was ever asked for before.
    pub fn put(&self, key: String, entry: CacheEntry) {
        let size_bytes = estimated_size(&entry);
        if size_bytes > self.max_entry_bytes {
            return;
        }

        let mut shard = self.shard_for(&key).write().expect("l1 shard lock poisoned");

        if let Some(old) = shard.index.remove(&key) {
            shard.bytes_used = shard.bytes_used.saturating_sub(old.size_bytes);
        }

        while shard.bytes_used + size_bytes > self.max_bytes_per_shard {
            match shard.order.pop_front() {
                Some(oldest_key) => {
                    if let Some(evicted) = shard.index.remove(&oldest_key) {
                        shard.bytes_used = shard.bytes_used.saturating_sub(evicted.size_bytes);
                    }
                }
                None => break,
            }
        }

        shard.order.push_back(key.clone());
        shard.bytes_used += size_bytes;
        shard.index.insert(
            key,
            Slot {
                entry,
                expires_at: Instant::now() + self.ttl,
                size_bytes,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        let mut shard = self.shard_for(key).write().expect("l1 shard lock poisoned");
        if let Some(slot) = shard.index.remove(key) {
            shard.bytes_used = shard.bytes_used.saturating_sub(slot.size_bytes);
        }
    }

    /// Reclaim expired entries across all shards. Run on a fixed interval by
    /// the owning service; never called from the hot path.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut reclaimed = 0;

        for shard_lock in &self.shards {
            let mut shard = shard_lock.write().expect("l1 shard lock poisoned");
            let expired_keys: Vec<String> = shard
                .index
                .iter()
                .filter(|(_, slot)| slot.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect();

            for key in expired_keys {
                if let Some(slot) = shard.index.remove(&key) {
                    shard.bytes_used = shard.bytes_used.saturating_sub(slot.size_bytes);
                }
                if let Some(pos) = shard.order.iter().position(|k| k == &key) {
                    shard.order.remove(pos);
                }
                reclaimed += 1;
            }
        }

        reclaimed
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().expect("l1 shard lock poisoned").index.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::link::RedirectKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample(short_code: &str) -> CacheEntry {
        CacheEntry {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            domain_id: None,
            short_code: short_code.to_string(),
            destination: "https://example.com".to_string(),
            redirect_kind: RedirectKind::Temporary,
            expires_at: None,
            disabled: false,
            password_protected: false,
            track_bots: true,
            webhooks_enabled: true,
            realtime_enabled: true,
            platform_overrides: vec![],
            cached_at: Utc::now(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = L1Cache::new(4, 1 << 20, Duration::from_secs(60), 4096);
        cache.put("abc".to_string(), sample("abc"));
        assert_eq!(cache.get("abc").unwrap().short_code, "abc");
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = L1Cache::new(4, 1 << 20, Duration::from_secs(60), 4096);
        cache.put("abc".to_string(), sample("abc"));
        cache.invalidate("abc");
        assert!(cache.get("abc").is_none());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = L1Cache::new(4, 1 << 20, Duration::from_millis(1), 4096);
        cache.put("abc".to_string(), sample("abc"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("abc").is_none());
    }

    #[test]
    fn oversized_entry_is_not_admitted() {
        let cache = L1Cache::new(1, 1024, Duration::from_secs(60), 16);
        cache.put("abc".to_string(), sample("abc"));
        assert!(cache.get("abc").is_none());
    }

    #[test]
    fn full_shard_evicts_oldest_entry() {
        let mut entry = sample("a");
        entry.destination = "x".repeat(200);
        let entry_size = estimated_size(&entry);
        let cache = L1Cache::new(1, (entry_size * 2) as u64, Duration::from_secs(60), entry_size + 1);

        let mut first = sample("a");
        first.destination = "x".repeat(200);
        cache.put("a".to_string(), first);

        let mut second = sample("b");
        second.destination = "y".repeat(200);
        cache.put("b".to_string(), second);

        let mut third = sample("c");
        third.destination = "z".repeat(200);
        cache.put("c".to_string(), third);

        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }
}
