//! Postgres-backed tracking lists.
//!
//! Schema lives in `migrations/0003_tracked_items.sql`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use billtrack_core::IdentityId;

use super::{ItemKind, TrackOutcome, TrackedItem, TrackingRepository, parse_kind};
use crate::error::{RepositoryError, backend};

pub struct PostgresTrackingStore {
    pool: Arc<PgPool>,
}

impl PostgresTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn item_from_row(row: &PgRow) -> Result<TrackedItem, RepositoryError> {
    let kind: String = row.try_get("item_type").map_err(backend)?;

    Ok(TrackedItem {
        kind: parse_kind(&kind)?,
        item_id: row.try_get("item_id").map_err(backend)?,
        notes: row.try_get("notes").map_err(backend)?,
        tracked_at: row.try_get("tracked_at").map_err(backend)?,
    })
}

#[async_trait]
impl TrackingRepository for PostgresTrackingStore {
    async fn track(&self, identity: IdentityId, item: TrackedItem) -> Result<TrackOutcome, RepositoryError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO tracked_items (user_id, item_type, item_id, notes, tracked_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, item_type, item_id) DO NOTHING
            RETURNING item_type, item_id, notes, tracked_at
            "#,
        )
        .bind(identity.as_uuid())
        .bind(item.kind.as_str())
        .bind(&item.item_id)
        .bind(item.notes.as_deref())
        .bind(item.tracked_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(backend)?;

        if let Some(row) = inserted {
            return Ok(TrackOutcome::Tracked(item_from_row(&row)?));
        }

        let existing = sqlx::query(
            r#"
            SELECT item_type, item_id, notes, tracked_at
            FROM tracked_items
            WHERE user_id = $1 AND item_type = $2 AND item_id = $3
            "#,
        )
        .bind(identity.as_uuid())
        .bind(item.kind.as_str())
        .bind(&item.item_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(backend)?;

        Ok(TrackOutcome::AlreadyTracking(item_from_row(&existing)?))
    }

    async fn untrack(&self, identity: IdentityId, kind: ItemKind, item_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM tracked_items WHERE user_id = $1 AND item_type = $2 AND item_id = $3",
        )
        .bind(identity.as_uuid())
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

    async fn list(&self, identity: IdentityId) -> Result<Vec<TrackedItem>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT item_type, item_id, notes, tracked_at
            FROM tracked_items
            WHERE user_id = $1
            ORDER BY tracked_at, item_type, item_id
            "#,
        )
        .bind(identity.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(item_from_row).collect()
    }
}
