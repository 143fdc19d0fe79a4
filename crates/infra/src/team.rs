//! Campaign team management.
//!
//! All mutations require the caller to hold `manage_team` on the campaign, as
//! decided by the permission evaluator. Listing members requires
//! `view_reports` on the campaign (any membership role).

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use billtrack_auth::{Identity, PermissionAction, TeamRole};
use billtrack_core::{DomainError, IdentityId, ResourceId};

use crate::Evaluator;
use crate::error::{RepositoryError, ServiceError, ServiceResult, require};
use crate::membership::{Membership, MembershipRepository};

#[derive(Clone)]
pub struct TeamService {
    evaluator: Arc<Evaluator>,
}

impl TeamService {
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }

    async fn gate(
        &self,
        actor: Option<&Identity>,
        action: PermissionAction,
        campaign: &ResourceId,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        let decision = self
            .evaluator
            .evaluate(actor, action, Some(campaign), cancel)
            .await?;
        require(decision)
    }

    pub async fn add_member(
        &self,
        actor: Option<&Identity>,
        campaign: &ResourceId,
        target: IdentityId,
        role: TeamRole,
        cancel: &CancellationToken,
    ) -> ServiceResult<Membership> {
        self.gate(actor, PermissionAction::ManageTeam, campaign, cancel).await?;

        let membership = self
            .evaluator
            .store()
            .add(campaign, target, role, Utc::now())
            .await
            .map_err(|e| -> ServiceError {
                match e {
                    RepositoryError::Duplicate => DomainError::conflict("already a team member").into(),
                    other => other.into(),
                }
            })?;

        tracing::info!(campaign = %campaign, member = %target, role = %role, "team member added");
        Ok(membership)
    }

    pub async fn update_role(
        &self,
        actor: Option<&Identity>,
        campaign: &ResourceId,
        target: IdentityId,
        role: TeamRole,
        cancel: &CancellationToken,
    ) -> ServiceResult<Membership> {
        self.gate(actor, PermissionAction::ManageTeam, campaign, cancel).await?;

        let membership = self
            .evaluator
            .store()
            .update_role(campaign, target, role)
            .await?;

        tracing::info!(campaign = %campaign, member = %target, role = %role, "team member role updated");
        Ok(membership)
    }

    pub async fn remove_member(
        &self,
        actor: Option<&Identity>,
        campaign: &ResourceId,
        target: IdentityId,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        self.gate(actor, PermissionAction::ManageTeam, campaign, cancel).await?;

        self.evaluator.store().remove(campaign, target).await?;

        tracing::info!(campaign = %campaign, member = %target, "team member removed");
        Ok(())
    }

    pub async fn list_members(
        &self,
        actor: Option<&Identity>,
        campaign: &ResourceId,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Membership>> {
        self.gate(actor, PermissionAction::ViewReports, campaign, cancel).await?;
        Ok(self.evaluator.store().list(campaign).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use billtrack_auth::{DenialReason, LookupError, MembershipStore, PermissionEvaluator};
    use chrono::DateTime;

    use crate::membership::{InMemoryMembershipStore, SharedMembership};

    struct Fixture {
        service: TeamService,
        store: SharedMembership,
        manager: Identity,
        campaign: ResourceId,
    }

    async fn fixture() -> Fixture {
        let store: SharedMembership = Arc::new(InMemoryMembershipStore::new());
        let evaluator = Arc::new(PermissionEvaluator::new(store.clone()));
        let manager = Identity::new(IdentityId::new()).with_metadata("subscription_tier", "paid");
        let campaign = ResourceId::from(42);
        store
            .add(&campaign, manager.id, TeamRole::Manager, Utc::now())
            .await
            .unwrap();

        Fixture {
            service: TeamService::new(evaluator),
            store,
            manager,
            campaign,
        }
    }

    #[tokio::test]
    async fn manager_can_add_update_and_remove_members() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        let member = IdentityId::new();

        f.service
            .add_member(Some(&f.manager), &f.campaign, member, TeamRole::Viewer, &cancel)
            .await
            .unwrap();
        let updated = f
            .service
            .update_role(Some(&f.manager), &f.campaign, member, TeamRole::Editor, &cancel)
            .await
            .unwrap();
        assert_eq!(updated.role, TeamRole::Editor);

        f.service
            .remove_member(Some(&f.manager), &f.campaign, member, &cancel)
            .await
            .unwrap();
        assert_eq!(f.store.lookup_team_role(&f.campaign, member).await.unwrap(), None);
    }

    #[tokio::test]
    async fn editor_cannot_manage_team() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        let editor = Identity::new(IdentityId::new()).with_metadata("subscription_tier", "paid");
        f.store
            .add(&f.campaign, editor.id, TeamRole::Editor, Utc::now())
            .await
            .unwrap();

        let err = f
            .service
            .add_member(Some(&editor), &f.campaign, IdentityId::new(), TeamRole::Viewer, &cancel)
            .await
            .unwrap_err();

        match err {
            ServiceError::Denied(decision) => {
                assert_eq!(decision.denial, Some(DenialReason::RequiresManagerRole));
                assert_eq!(decision.team_role, Some(TeamRole::Editor));
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn adding_an_existing_member_conflicts() {
        let f = fixture().await;
        let err = f
            .service
            .add_member(Some(&f.manager), &f.campaign, f.manager.id, TeamRole::Viewer, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn sole_manager_cannot_leave_or_be_demoted() {
        let f = fixture().await;
        let cancel = CancellationToken::new();

        let err = f
            .service
            .remove_member(Some(&f.manager), &f.campaign, f.manager.id, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::LastManager);

        let err = f
            .service
            .update_role(Some(&f.manager), &f.campaign, f.manager.id, TeamRole::Viewer, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::LastManager);
    }

    #[tokio::test]
    async fn non_members_cannot_list_members() {
        let f = fixture().await;
        let outsider = Identity::new(IdentityId::new());

        let err = f
            .service
            .list_members(Some(&outsider), &f.campaign, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Denied(d) if d.denial == Some(DenialReason::NotATeamMember)));

        let members = f
            .service
            .list_members(Some(&f.manager), &f.campaign, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
    }

    /// Yields before every call, like a round trip to a database would.
    struct Yielding(InMemoryMembershipStore);

    #[async_trait]
    impl MembershipStore for Yielding {
        async fn lookup_team_role(
            &self,
            resource: &ResourceId,
            identity: IdentityId,
        ) -> Result<Option<TeamRole>, LookupError> {
            tokio::task::yield_now().await;
            self.0.lookup_team_role(resource, identity).await
        }
    }

    #[async_trait]
    impl MembershipRepository for Yielding {
        async fn add(
            &self,
            resource: &ResourceId,
            identity: IdentityId,
            role: TeamRole,
            joined_at: DateTime<Utc>,
        ) -> Result<Membership, RepositoryError> {
            tokio::task::yield_now().await;
            self.0.add(resource, identity, role, joined_at).await
        }

        async fn update_role(
            &self,
            resource: &ResourceId,
            identity: IdentityId,
            role: TeamRole,
        ) -> Result<Membership, RepositoryError> {
            tokio::task::yield_now().await;
            self.0.update_role(resource, identity, role).await
        }

        async fn remove(&self, resource: &ResourceId, identity: IdentityId) -> Result<(), RepositoryError> {
            tokio::task::yield_now().await;
            self.0.remove(resource, identity).await
        }

        async fn list(&self, resource: &ResourceId) -> Result<Vec<Membership>, RepositoryError> {
            tokio::task::yield_now().await;
            self.0.list(resource).await
        }
    }

    #[tokio::test]
    async fn concurrent_departures_leave_one_manager() {
        let store: SharedMembership = Arc::new(Yielding(InMemoryMembershipStore::new()));
        let service = TeamService::new(Arc::new(PermissionEvaluator::new(store.clone())));
        let campaign = ResourceId::from(7);
        let a = Identity::new(IdentityId::new());
        let b = Identity::new(IdentityId::new());
        for who in [&a, &b] {
            store.add(&campaign, who.id, TeamRole::Manager, Utc::now()).await.unwrap();
        }
        let cancel = CancellationToken::new();

        let (ra, rb) = tokio::join!(
            service.remove_member(Some(&a), &campaign, a.id, &cancel),
            service.update_role(Some(&b), &campaign, b.id, TeamRole::Viewer, &cancel),
        );

        let failures = [ra.err(), rb.map(|_| ()).err()];
        assert_eq!(
            failures.iter().filter(|e| **e == Some(ServiceError::LastManager)).count(),
            1,
            "exactly one of the two changes must be refused: {failures:?}"
        );
        let managers = store
            .list(&campaign)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.role == TeamRole::Manager)
            .count();
        assert_eq!(managers, 1);
    }
}
