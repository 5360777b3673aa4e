// Link resolver: the single authoritative lookup order, composing the
// two-tier cache ahead of the authoritative store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{L1Cache, L2Cache};
use crate::models::cache_entry::CacheEntry;
use crate::store::{LinkStore, WorkspaceStore};
use crate::utils::ResolveError;

#[derive(Debug, Default)]
pub struct ResolverMetrics {
    pub l1_hits: AtomicU64,
    pub l2_hits: AtomicU64,
    pub store_hits: AtomicU64,
    pub misses: AtomicU64,
}

pub struct LinkResolver {
    l1: Arc<L1Cache>,
    l2: Arc<L2Cache>,
    store: Arc<dyn LinkStore>,
    workspace_store: Arc<dyn WorkspaceStore>,
    metrics: Arc<ResolverMetrics>,
}

impl LinkResolver {
    pub fn new(
        l1: Arc<L1Cache>,
        l2: Arc<L2Cache>,
        store: Arc<dyn LinkStore>,
        workspace_store: Arc<dyn WorkspaceStore>,
    ) -> Self {
        Self {
            l1,
            l2,
            store,
            workspace_store,
            metrics: Arc::new(ResolverMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<ResolverMetrics> {
        self.metrics.clone()
    }

    pub fn fingerprint(domain: &str, short_code: &str) -> String {
        format!("{domain}:{short_code}")
    }

    /// `domain_id` resolves a custom domain hostname to a workspace-owned
    /// domain record; that lookup belongs to a domain-management service
    /// this core treats as external, so callers pass `None` for the
    /// platform default domain and whatever they've already resolved
    /// otherwise.
    pub async fn resolve(
        &self,
        domain_id: Option<Uuid>,
        domain: &str,
        short_code: &str,
    ) -> Result<CacheEntry, ResolveError> {
        let key = Self::fingerprint(domain, short_code);
        let now = Utc::now();

        if let Some(entry) = self.l1.get(&key) {
            self.metrics.l1_hits.fetch_add(1, Ordering::Relaxed);
            return self.validate(entry, now);
        }

        if let Some(entry) = self.l2.get(&key).await {
            self.metrics.l2_hits.fetch_add(1, Ordering::Relaxed);
            self.l1.put(key.clone(), entry.clone());
            return self.validate(entry, now);
        }

        match self.store.find_by_code(domain_id, short_code).await {
            Ok(Some(link)) => {
                self.metrics.store_hits.fetch_add(1, Ordering::Relaxed);
                let (track_bots_default, webhooks_enabled, realtime_enabled) =
                    self.workspace_flags(link.workspace_id).await;
                let entry = CacheEntry::from_link(
                    &link,
                    now,
                    track_bots_default,
                    webhooks_enabled,
                    realtime_enabled,
                );
                self.l2.set(&key, &entry).await;
                self.l1.put(key, entry.clone());
                self.validate(entry, now)
            }
            Ok(None) => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                debug!("resolver miss for {}", key);
                Err(ResolveError::NotFound)
            }
            Err(e) => {
                warn!("authoritative store lookup failed for {}: {}", key, e);
                Err(e)
            }
        }
    }

    /// Called by a writer (link update/delete) to drop the cached copy
    /// everywhere: L1 locally, L2 plus its cross-node invalidation publish.
    pub async fn invalidate(&self, domain: &str, short_code: &str) {
        let key = Self::fingerprint(domain, short_code);
        self.l1.invalidate(&key);
        self.l2.invalidate(&key).await;
    }

    /// `(track_bots_default, webhooks_enabled, realtime_enabled)` for the
    /// owning workspace. Falls back to the conservative all-disabled tuple
    /// when the workspace has no record or the lookup itself fails, so a
    /// missing/unreachable workspace never silently enables dispatch.
    async fn workspace_flags(&self, workspace_id: Uuid) -> (bool, bool, bool) {
        match self.workspace_store.get(workspace_id).await {
            Ok(Some(settings)) => (
                settings.track_bots_default,
                settings.webhooks_enabled,
                settings.realtime_enabled,
            ),
            Ok(None) => {
                debug!("no workspace settings for {}, using conservative defaults", workspace_id);
                (false, false, false)
            }
            Err(e) => {
                warn!("workspace lookup failed for {}: {}", workspace_id, e);
                (false, false, false)
            }
        }
    }

    fn validate(&self, entry: CacheEntry, now: chrono::DateTime<Utc>) -> Result<CacheEntry, ResolveError> {
        if entry.disabled {
            return Err(ResolveError::Disabled);
        }
        if entry.is_expired_at(now) {
            return Err(ResolveError::Expired);
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_joins_domain_and_code() {
        assert_eq!(LinkResolver::fingerprint("qck.sh", "abc123"), "qck.sh:abc123");
    }
}
