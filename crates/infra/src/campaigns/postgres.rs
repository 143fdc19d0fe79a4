//! Postgres-backed campaign tables.
//!
//! Schema lives in `migrations/0002_campaigns.sql`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use billtrack_core::{IdentityId, ResourceId};

use super::{Campaign, CampaignItem, CampaignRepository};
use crate::error::{RepositoryError, backend};
use crate::tracking::{ItemKind, parse_kind};

pub struct PostgresCampaignStore {
    pool: Arc<PgPool>,
}

impl PostgresCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn campaign_from_row(row: &PgRow) -> Result<Campaign, RepositoryError> {
    let id: String = row.try_get("id").map_err(backend)?;
    let lead_id: uuid::Uuid = row.try_get("lead_id").map_err(backend)?;

    Ok(Campaign {
        id: ResourceId::new(id),
        name: row.try_get("name").map_err(backend)?,
        description: row.try_get("description").map_err(backend)?,
        lead_id: IdentityId::from_uuid(lead_id),
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn item_from_row(campaign: &ResourceId, row: &PgRow) -> Result<CampaignItem, RepositoryError> {
    let kind: String = row.try_get("item_type").map_err(backend)?;
    let added_by: uuid::Uuid = row.try_get("added_by").map_err(backend)?;
    let added_at: DateTime<Utc> = row.try_get("added_at").map_err(backend)?;

    Ok(CampaignItem {
        campaign_id: campaign.clone(),
        kind: parse_kind(&kind)?,
        item_id: row.try_get("item_id").map_err(backend)?,
        added_by: IdentityId::from_uuid(added_by),
        added_at,
    })
}

#[async_trait]
impl CampaignRepository for PostgresCampaignStore {
    async fn insert(&self, campaign: &Campaign) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO campaigns (id, name, description, lead_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(campaign.id.as_str())
        .bind(&campaign.name)
        .bind(campaign.description.as_deref())
        .bind(campaign.lead_id.as_uuid())
        .bind(campaign.created_at)
        .execute(&*self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Duplicate);
        }
        Ok(())
    }

    async fn get(&self, id: &ResourceId) -> Result<Option<Campaign>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, lead_id, created_at
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn add_item(&self, item: CampaignItem) -> Result<CampaignItem, RepositoryError> {
        // The no-op update makes RETURNING yield the stored row on conflict too.
        let row = sqlx::query(
            r#"
            INSERT INTO campaign_items (campaign_id, item_type, item_id, added_by, added_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (campaign_id, item_type, item_id)
            DO UPDATE SET item_id = EXCLUDED.item_id
            RETURNING item_type, item_id, added_by, added_at
            "#,
        )
        .bind(item.campaign_id.as_str())
        .bind(item.kind.as_str())
        .bind(&item.item_id)
        .bind(item.added_by.as_uuid())
        .bind(item.added_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(backend)?;

        item_from_row(&item.campaign_id, &row)
    }

    async fn remove_item(
        &self,
        campaign: &ResourceId,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM campaign_items WHERE campaign_id = $1 AND item_type = $2 AND item_id = $3",
        )
        .bind(campaign.as_str())
        .bind(kind.as_str())
        .bind(item_id)
        .execute(&*self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Missing);
        }
        Ok(())
    }

    async fn list_items(&self, campaign: &ResourceId) -> Result<Vec<CampaignItem>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT item_type, item_id, added_by, added_at
            FROM campaign_items
            WHERE campaign_id = $1
            ORDER BY added_at, item_type, item_id
            "#,
        )
        .bind(campaign.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(|row| item_from_row(campaign, row)).collect()
    }
}
