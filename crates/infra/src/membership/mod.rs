//! Team membership storage.
//!
//! The read path (`MembershipStore`) is what the permission evaluator consults;
//! `MembershipRepository` adds the writes used by team management.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use billtrack_auth::{MembershipStore, TeamRole};
use billtrack_core::{IdentityId, ResourceId};

pub use crate::error::RepositoryError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryMembershipStore;
pub use postgres::PostgresMembershipStore;

/// One row of the membership table: `identity` holds `role` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub resource: ResourceId,
    pub identity: IdentityId,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

#[async_trait]
pub trait MembershipRepository: MembershipStore {
    async fn add(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
        role: TeamRole,
        joined_at: DateTime<Utc>,
    ) -> Result<Membership, RepositoryError>;

    /// Change a member's role.
    ///
    /// Demoting the resource's only manager fails with `LastManager`. The check
    /// and the write happen atomically with respect to other role changes and
    /// removals on the same resource.
    async fn update_role(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
        role: TeamRole,
    ) -> Result<Membership, RepositoryError>;

    /// Remove a membership; the identity keeps its roles on other resources.
    ///
    /// Same last-manager guarantee as [`MembershipRepository::update_role`].
    async fn remove(&self, resource: &ResourceId, identity: IdentityId) -> Result<(), RepositoryError>;

    /// Members of `resource`, oldest first.
    async fn list(&self, resource: &ResourceId) -> Result<Vec<Membership>, RepositoryError>;
}

/// Runtime-selected membership backend.
pub type SharedMembership = Arc<dyn MembershipRepository>;
