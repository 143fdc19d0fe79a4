//! Backend selection: one set of repositories, all in memory or all in Postgres.

use std::sync::Arc;

use sqlx::PgPool;

use billtrack_auth::LookupError;

use crate::campaigns::{InMemoryCampaignStore, PostgresCampaignStore, SharedCampaigns};
use crate::error::backend;
use crate::membership::{InMemoryMembershipStore, PostgresMembershipStore, SharedMembership};
use crate::tracking::{InMemoryTrackingStore, PostgresTrackingStore, SharedTracking};

#[derive(Clone)]
pub struct Stores {
    pub membership: SharedMembership,
    pub campaigns: SharedCampaigns,
    pub tracking: SharedTracking,
}

impl Stores {
    /// Process-local tables; everything is lost on restart.
    pub fn in_memory() -> Self {
        Self {
            membership: Arc::new(InMemoryMembershipStore::new()),
            campaigns: Arc::new(InMemoryCampaignStore::new()),
            tracking: Arc::new(InMemoryTrackingStore::new()),
        }
    }

    /// All repositories over one connection pool. Expects the schema from
    /// `migrations/` to be applied.
    pub async fn postgres(database_url: &str) -> Result<Self, LookupError> {
        let pool = PgPool::connect(database_url).await.map_err(backend)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            membership: Arc::new(PostgresMembershipStore::new(pool.clone())),
            campaigns: Arc::new(PostgresCampaignStore::new(pool.clone())),
            tracking: Arc::new(PostgresTrackingStore::new(pool)),
        }
    }
}
