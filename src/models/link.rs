// Link model: the record resolved on the redirect hot path.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::schema::links;

/// Redirect kind, persisted as Int2 in `links.redirect_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum RedirectKind {
    Permanent = 0,
    Temporary = 1,
}

impl From<i16> for RedirectKind {
    fn from(value: i16) -> Self {
        match value {
            1 => RedirectKind::Temporary,
            _ => RedirectKind::Permanent,
        }
    }
}

impl RedirectKind {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

/// Link record as read from the authoritative store.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Link {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub domain_id: Option<Uuid>,
    pub short_code: String,
    pub destination: String,
    pub redirect_kind: i16,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled: bool,
    pub password_hash: Option<String>,
    pub track_bots: Option<bool>,
    pub platform_overrides: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Link {
    pub fn redirect_kind(&self) -> RedirectKind {
        RedirectKind::from(self.redirect_kind)
    }

    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// `track_bots` falls back to the owning workspace's default when the
    /// link hasn't set its own.
    pub fn effective_track_bots(&self, workspace_default: bool) -> bool {
        self.track_bots.unwrap_or(workspace_default)
    }

    /// Platform-specific override URL (iOS/Android app-deep-link redirects).
    pub fn platform_override(&self, platform: &str) -> Option<String> {
        self.platform_overrides
            .as_ref()?
            .get(platform)?
            .as_str()
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = links)]
pub struct NewLink {
    pub workspace_id: Uuid,
    pub domain_id: Option<Uuid>,
    pub short_code: String,
    pub destination: String,
    pub redirect_kind: i16,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled: bool,
    pub password_hash: Option<String>,
    pub track_bots: Option<bool>,
    pub platform_overrides: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_kind_round_trips_through_i16() {
        assert_eq!(RedirectKind::from(0).as_i16(), 0);
        assert_eq!(RedirectKind::from(1).as_i16(), 1);
        assert!(matches!(RedirectKind::from(99), RedirectKind::Permanent));
    }

    fn sample_link(track_bots: Option<bool>) -> Link {
        let now = Utc::now();
        Link {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            domain_id: None,
            short_code: "abc123".to_string(),
            destination: "https://example.com".to_string(),
            redirect_kind: 0,
            expires_at: None,
            disabled: false,
            password_hash: None,
            track_bots,
            platform_overrides: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn effective_track_bots_falls_back_to_workspace_default() {
        assert!(sample_link(None).effective_track_bots(true));
        assert!(!sample_link(None).effective_track_bots(false));
    }

    #[test]
    fn effective_track_bots_prefers_its_own_value() {
        assert!(sample_link(Some(true)).effective_track_bots(false));
        assert!(!sample_link(Some(false)).effective_track_bots(true));
    }
}
