// Cache entry: the value shape shared identically between L1 and L2.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::link::{Link, RedirectKind};

/// A cached `Link` plus the instant it was admitted. L1 and L2 hold the
/// identical shape so promoting an L2 hit into L1 is a copy, not a re-encode.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub domain_id: Option<Uuid>,
    pub short_code: String,
    pub destination: String,
    pub redirect_kind: RedirectKind,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled: bool,
    pub password_protected: bool,
    pub track_bots: bool,
    pub webhooks_enabled: bool,
    pub realtime_enabled: bool,
    pub platform_overrides: Vec<(String, String)>,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// `track_bots_default`, `webhooks_enabled`, `realtime_enabled` come from
    /// the owning workspace and are resolved once here, at admission, so the
    /// cached entry carries its own merged flags instead of requiring a
    /// workspace lookup on every hit.
    pub fn from_link(
        link: &Link,
        now: DateTime<Utc>,
        track_bots_default: bool,
        webhooks_enabled: bool,
        realtime_enabled: bool,
    ) -> Self {
        let platform_overrides = link
            .platform_overrides
            .as_ref()
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: link.id,
            workspace_id: link.workspace_id,
            domain_id: link.domain_id,
            short_code: link.short_code.clone(),
            destination: link.destination.clone(),
            redirect_kind: link.redirect_kind(),
            expires_at: link.expires_at,
            disabled: link.disabled,
            password_protected: link.is_password_protected(),
            track_bots: link.effective_track_bots(track_bots_default),
            webhooks_enabled,
            realtime_enabled,
            platform_overrides,
            cached_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    pub fn platform_override(&self, platform: &str) -> Option<&str> {
        self.platform_overrides
            .iter()
            .find(|(k, _)| k == platform)
            .map(|(_, v)| v.as_str())
    }
}
