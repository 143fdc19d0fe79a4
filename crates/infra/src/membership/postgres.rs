//! Postgres-backed membership table.
//!
//! Schema lives in `migrations/0001_team_members.sql`. Every statement is keyed
//! by `(campaign_id, user_id)`, so one identity's rows on different campaigns
//! never interfere.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use billtrack_auth::{LookupError, MembershipStore, TeamRole};
use billtrack_core::{IdentityId, ResourceId};

use super::{Membership, MembershipRepository, RepositoryError};
use crate::error::backend;

pub struct PostgresMembershipStore {
    pool: Arc<PgPool>,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn parse_role(raw: &str) -> Result<TeamRole, LookupError> {
    raw.parse::<TeamRole>()
        .map_err(|e| LookupError::corrupt(e.to_string()))
}

/// Whether moving `identity` to `next` (`None` = removed) leaves no manager,
/// given the campaign's current managers.
fn strips_last_manager(managers: &[uuid::Uuid], identity: &uuid::Uuid, next: Option<TeamRole>) -> bool {
    managers.contains(identity) && next != Some(TeamRole::Manager) && managers.len() <= 1
}

/// Lock the campaign's manager rows for the rest of `tx` and refuse a change
/// that would remove the last one.
///
/// Concurrent demotions/removals on the same campaign queue on these row locks;
/// once the first commits, the next one re-reads the manager set and sees the
/// change.
async fn guard_last_manager(
    tx: &mut Transaction<'_, Postgres>,
    resource: &ResourceId,
    identity: IdentityId,
    next: Option<TeamRole>,
) -> Result<(), RepositoryError> {
    let managers: Vec<uuid::Uuid> = sqlx::query_scalar(
        r#"
        SELECT user_id
        FROM team_members
        WHERE campaign_id = $1 AND role = 'manager'
        FOR UPDATE
        "#,
    )
    .bind(resource.as_str())
    .fetch_all(&mut **tx)
    .await
    .map_err(backend)?;

    if strips_last_manager(&managers, identity.as_uuid(), next) {
        return Err(RepositoryError::LastManager);
    }
    Ok(())
}

fn membership_from_row(resource: &ResourceId, row: &PgRow) -> Result<Membership, LookupError> {
    let user_id: uuid::Uuid = row.try_get("user_id").map_err(backend)?;
    let role: String = row.try_get("role").map_err(backend)?;
    let joined_at: DateTime<Utc> = row.try_get("joined_at").map_err(backend)?;

    Ok(Membership {
        resource: resource.clone(),
        identity: IdentityId::from_uuid(user_id),
        role: parse_role(&role)?,
        joined_at,
    })
}

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    async fn lookup_team_role(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
    ) -> Result<Option<TeamRole>, LookupError> {
        let row = sqlx::query(
            r#"
            SELECT role
            FROM team_members
            WHERE campaign_id = $1 AND user_id = $2
            "#,
        )
        .bind(resource.as_str())
        .bind(identity.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => {
                let role: String = row.try_get("role").map_err(backend)?;
                Ok(Some(parse_role(&role)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MembershipRepository for PostgresMembershipStore {
    async fn add(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
        role: TeamRole,
        joined_at: DateTime<Utc>,
    ) -> Result<Membership, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO team_members (campaign_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (campaign_id, user_id) DO NOTHING
            RETURNING user_id, role, joined_at
            "#,
        )
        .bind(resource.as_str())
        .bind(identity.as_uuid())
        .bind(role.as_str())
        .bind(joined_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(membership_from_row(resource, &row)?),
            None => Err(RepositoryError::Duplicate),
        }
    }

    async fn update_role(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
        role: TeamRole,
    ) -> Result<Membership, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        guard_last_manager(&mut tx, resource, identity, Some(role)).await?;

        let row = sqlx::query(
            r#"
            UPDATE team_members
            SET role = $3
            WHERE campaign_id = $1 AND user_id = $2
            RETURNING user_id, role, joined_at
            "#,
        )
        .bind(resource.as_str())
        .bind(identity.as_uuid())
        .bind(role.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Err(RepositoryError::Missing);
        };
        let membership = membership_from_row(resource, &row)?;

        tx.commit().await.map_err(backend)?;
        Ok(membership)
    }

    async fn remove(&self, resource: &ResourceId, identity: IdentityId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        guard_last_manager(&mut tx, resource, identity, None).await?;

        let result = sqlx::query("DELETE FROM team_members WHERE campaign_id = $1 AND user_id = $2")
            .bind(resource.as_str())
            .bind(identity.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Missing);
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn list(&self, resource: &ResourceId) -> Result<Vec<Membership>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, role, joined_at
            FROM team_members
            WHERE campaign_id = $1
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(resource.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| membership_from_row(resource, row).map_err(RepositoryError::from))
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_roles_parse_and_unknown_ones_are_corrupt() {
        assert_eq!(parse_role("editor"), Ok(TeamRole::Editor));
        assert!(matches!(parse_role("owner"), Err(LookupError::Corrupt(_))));
    }

    #[test]
    fn last_manager_rule_over_the_locked_manager_set() {
        let (a, b, c) = (uuid::Uuid::now_v7(), uuid::Uuid::now_v7(), uuid::Uuid::now_v7());

        assert!(strips_last_manager(&[a], &a, None));
        assert!(strips_last_manager(&[a], &a, Some(TeamRole::Viewer)));
        assert!(!strips_last_manager(&[a], &a, Some(TeamRole::Manager)));
        assert!(!strips_last_manager(&[a, b], &a, None));
        // Non-managers never trip the rule.
        assert!(!strips_last_manager(&[a], &c, None));
    }
}
