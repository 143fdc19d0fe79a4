use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use billtrack_auth::{LookupError, MembershipStore, TeamRole};
use billtrack_core::{IdentityId, ResourceId};

use super::{Membership, MembershipRepository, RepositoryError};
use crate::error::poisoned;

type Table = HashMap<(ResourceId, IdentityId), Membership>;

/// In-memory membership table for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    inner: RwLock<Table>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether moving `identity` to `next` (`None` = removed) would leave
/// `resource` with no manager. Must be called under the write guard.
fn strips_last_manager(
    table: &Table,
    resource: &ResourceId,
    identity: IdentityId,
    next: Option<TeamRole>,
) -> bool {
    let current = table.get(&(resource.clone(), identity)).map(|m| m.role);
    if current != Some(TeamRole::Manager) || next == Some(TeamRole::Manager) {
        return false;
    }

    table
        .values()
        .filter(|m| &m.resource == resource && m.role == TeamRole::Manager)
        .count()
        <= 1
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn lookup_team_role(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
    ) -> Result<Option<TeamRole>, LookupError> {
        let map = self.inner.read().map_err(|_| poisoned("membership"))?;
        Ok(map.get(&(resource.clone(), identity)).map(|m| m.role))
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipStore {
    async fn add(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
        role: TeamRole,
        joined_at: DateTime<Utc>,
    ) -> Result<Membership, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned("membership"))?;
        let key = (resource.clone(), identity);
        if map.contains_key(&key) {
            return Err(RepositoryError::Duplicate);
        }

        let membership = Membership {
            resource: resource.clone(),
            identity,
            role,
            joined_at,
        };
        map.insert(key, membership.clone());
        Ok(membership)
    }

    async fn update_role(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
        role: TeamRole,
    ) -> Result<Membership, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned("membership"))?;
        if strips_last_manager(&map, resource, identity, Some(role)) {
            return Err(RepositoryError::LastManager);
        }

        let membership = map
            .get_mut(&(resource.clone(), identity))
            .ok_or(RepositoryError::Missing)?;
        membership.role = role;
        Ok(membership.clone())
    }

    async fn remove(&self, resource: &ResourceId, identity: IdentityId) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| poisoned("membership"))?;
        if strips_last_manager(&map, resource, identity, None) {
            return Err(RepositoryError::LastManager);
        }

        map.remove(&(resource.clone(), identity))
            .map(|_| ())
            .ok_or(RepositoryError::Missing)
    }

    async fn list(&self, resource: &ResourceId) -> Result<Vec<Membership>, RepositoryError> {
        let map = self.inner.read().map_err(|_| poisoned("membership"))?;
        let mut members: Vec<Membership> = map
            .values()
            .filter(|m| &m.resource == resource)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.identity.cmp(&b.identity)));
        Ok(members)
    }
}
