// ClickEvent: the pooled, reusable record carried through the click pipeline.
// Strings are cleared rather than dropped on reset so the backing allocation
// survives a release/acquire cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Unknown,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Unknown
    }
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Bot => "bot",
            DeviceType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub event_id: Uuid,
    pub link_id: Uuid,
    pub short_code: String,
    pub workspace_id: Uuid,
    pub timestamp: DateTime<Utc>,

    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub referer_host: String,

    pub country: String,
    pub country_code: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,

    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,

    pub is_bot: bool,
    pub is_unique: bool,

    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,

    pub webhooks_enabled: bool,
    pub realtime_enabled: bool,
}

impl Default for ClickEvent {
    fn default() -> Self {
        Self {
            event_id: Uuid::nil(),
            link_id: Uuid::nil(),
            short_code: String::new(),
            workspace_id: Uuid::nil(),
            timestamp: DateTime::<Utc>::MIN_UTC,
            ip_address: String::new(),
            user_agent: String::new(),
            referer: String::new(),
            referer_host: String::new(),
            country: String::new(),
            country_code: String::new(),
            city: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            timezone: String::new(),
            device_type: DeviceType::Unknown,
            browser: String::new(),
            os: String::new(),
            is_bot: false,
            is_unique: false,
            utm_source: String::new(),
            utm_medium: String::new(),
            utm_campaign: String::new(),
            webhooks_enabled: false,
            realtime_enabled: false,
        }
    }
}

impl ClickEvent {
    /// Clear every field in place, preserving each `String`'s backing capacity
    /// so the event can be handed back to the pool without a fresh allocation
    /// on its next acquire.
    pub fn reset(&mut self) {
        self.event_id = Uuid::nil();
        self.link_id = Uuid::nil();
        self.short_code.clear();
        self.workspace_id = Uuid::nil();
        self.timestamp = DateTime::<Utc>::MIN_UTC;
        self.ip_address.clear();
        self.user_agent.clear();
        self.referer.clear();
        self.referer_host.clear();
        self.country.clear();
        self.country_code.clear();
        self.city.clear();
        self.latitude = 0.0;
        self.longitude = 0.0;
        self.timezone.clear();
        self.device_type = DeviceType::Unknown;
        self.browser.clear();
        self.os.clear();
        self.is_bot = false;
        self.is_unique = false;
        self.utm_source.clear();
        self.utm_medium.clear();
        self.utm_campaign.clear();
        self.webhooks_enabled = false;
        self.realtime_enabled = false;
    }

    /// Parse `utm_*` query parameters out of a referer URL, if present.
    pub fn fill_utm_from_referer(&mut self) {
        let Ok(parsed) = url::Url::parse(&self.referer) else {
            return;
        };
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "utm_source" => self.utm_source = value.into_owned(),
                "utm_medium" => self.utm_medium = value.into_owned(),
                "utm_campaign" => self.utm_campaign = value.into_owned(),
                _ => {}
            }
        }
        self.referer_host = parsed.host_str().unwrap_or_default().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_fields_but_keeps_capacity() {
        let mut event = ClickEvent::default();
        event.user_agent = "Mozilla/5.0".repeat(8);
        let cap_before = event.user_agent.capacity();

        event.reset();

        assert!(event.user_agent.is_empty());
        assert_eq!(event.user_agent.capacity(), cap_before);
        assert_eq!(event.link_id, Uuid::nil());
    }

    #[test]
    fn fill_utm_from_referer_extracts_query_params() {
        let mut event = ClickEvent::default();
        event.referer = "https://example.com/page?utm_source=newsletter&utm_medium=email".into();

        event.fill_utm_from_referer();

        assert_eq!(event.utm_source, "newsletter");
        assert_eq!(event.utm_medium, "email");
        assert_eq!(event.referer_host, "example.com");
    }
}
