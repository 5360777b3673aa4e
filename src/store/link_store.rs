// LinkStore: the thin interface onto the authoritative store. Treated as an
// external collaborator; this is its Diesel + bb8 backed implementation.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::Link;
use crate::schema::links;
use crate::utils::ResolveError;

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Look up a link by (domain, short code). `domain` is `None` when the
    /// request used the platform default domain rather than a custom one.
    async fn find_by_code(
        &self,
        domain_id: Option<Uuid>,
        short_code: &str,
    ) -> Result<Option<Link>, ResolveError>;
}

pub struct PgLinkStore {
    pool: DieselPool,
}

impl PgLinkStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn find_by_code(
        &self,
        domain_id: Option<Uuid>,
        short_code: &str,
    ) -> Result<Option<Link>, ResolveError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ResolveError::StoreUnavailable(e.to_string()))?;

        let result = links::table
            .filter(links::short_code.eq(short_code))
            .filter(links::domain_id.is_not_distinct_from(domain_id))
            .select(Link::as_select())
            .first::<Link>(&mut conn)
            .await
            .optional()?;

        Ok(result)
    }
}
