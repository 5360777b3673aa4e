// Webhook subscription and delivery records.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::schema::webhook_subscriptions;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = webhook_subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub url: String,
    pub secret: String,
    pub events: JsonValue,
    pub active: bool,
    pub failure_streak: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookSubscription {
    pub fn subscribes_to(&self, event_kind: &str) -> bool {
        self.events
            .as_array()
            .map(|events| events.iter().any(|e| e.as_str() == Some(event_kind)))
            .unwrap_or(false)
    }
}

/// Delivery status for one webhook attempt set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Dead,
}

/// A scheduled or in-flight webhook delivery. Lives in an in-process retry
/// queue rather than being persisted row-by-row; a multi-node deployment
/// would back this with a shared sorted set instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub workspace_id: Uuid,
    pub event_kind: String,
    pub payload: Vec<u8>,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl WebhookDelivery {
    pub fn new(webhook_id: Uuid, workspace_id: Uuid, event_kind: String, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            webhook_id,
            workspace_id,
            event_kind,
            payload,
            attempts: 0,
            next_attempt_at: Utc::now(),
            status: DeliveryStatus::Pending,
        }
    }
}
