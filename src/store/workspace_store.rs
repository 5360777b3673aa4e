// WorkspaceStore: read-only lookup for workspace settings this core needs
// (`track_bots_default`, feature flags), backed here by the same Postgres
// database as the link store.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::WorkspaceSettings;
use crate::schema::workspaces;
use crate::utils::ResolveError;

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn get(&self, workspace_id: Uuid) -> Result<Option<WorkspaceSettings>, ResolveError>;
}

pub struct PgWorkspaceStore {
    pool: DieselPool,
}

impl PgWorkspaceStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceStore for PgWorkspaceStore {
    async fn get(&self, workspace_id: Uuid) -> Result<Option<WorkspaceSettings>, ResolveError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ResolveError::StoreUnavailable(e.to_string()))?;

        let result = workspaces::table
            .find(workspace_id)
            .select(WorkspaceSettings::as_select())
            .first::<WorkspaceSettings>(&mut conn)
            .await
            .optional()?;

        Ok(result)
    }
}
