// Workspace settings: a read-only lookup this core consumes from the
// workspace/billing surface it otherwise treats as external.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::workspaces;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = workspaces)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkspaceSettings {
    pub id: Uuid,
    pub track_bots_default: bool,
    pub webhooks_enabled: bool,
    pub realtime_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
