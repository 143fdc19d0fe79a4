//! Permission Evaluator.
//!
//! Combines the tier (from the verified identity), an optional team-role lookup
//! and the policy table into a [`Decision`]. The evaluator holds no mutable
//! state; identical inputs against an unchanged membership store always give
//! identical results, so callers may retry or evaluate speculatively.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use billtrack_core::{IdentityId, ResourceId};

use crate::action::ActionName;
use crate::claims::{AuthProvider, VerificationError};
use crate::identity::Identity;
use crate::policy::{Decision, decide};
use crate::team::TeamRole;
use crate::tier::resolve_tier;

/// Default upper bound for a single membership lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// The membership store could not answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store returned corrupt data: {0}")]
    Corrupt(String),
}

impl LookupError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AbortCause {
    Cancelled,
    TimedOut,
}

impl core::fmt::Display for AbortCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AbortCause::Cancelled => f.write_str("cancelled"),
            AbortCause::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Infrastructure failure during evaluation.
///
/// A denial is never one of these: "could not tell" and "no" stay distinct.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("identity verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("team membership lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("evaluation aborted ({0})")]
    Aborted(AbortCause),
}

/// Read side of the team membership table.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Role of `identity` on `resource`, `None` when it holds no membership.
    async fn lookup_team_role(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
    ) -> Result<Option<TeamRole>, LookupError>;
}

#[async_trait]
impl<S> MembershipStore for Arc<S>
where
    S: MembershipStore + ?Sized,
{
    async fn lookup_team_role(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
    ) -> Result<Option<TeamRole>, LookupError> {
        (**self).lookup_team_role(resource, identity).await
    }
}

#[derive(Debug, Clone)]
pub struct PermissionEvaluator<S> {
    store: S,
    lookup_timeout: Duration,
}

impl<S: MembershipStore> PermissionEvaluator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide whether `identity` may perform `action`, optionally on `resource`.
    ///
    /// `identity` must already be verified; `None` is the anonymous caller.
    /// Issues at most one membership lookup, and only for team-scoped actions
    /// on a named resource by a known identity.
    pub async fn evaluate(
        &self,
        identity: Option<&Identity>,
        action: impl Into<ActionName>,
        resource: Option<&ResourceId>,
        cancel: &CancellationToken,
    ) -> Result<Decision, EvaluationError> {
        if cancel.is_cancelled() {
            return Err(EvaluationError::Aborted(AbortCause::Cancelled));
        }

        let action = action.into();
        let tier = resolve_tier(identity);

        let needs_lookup = action.known().is_some_and(|a| a.is_team_scoped());
        let team_role = match (identity, resource) {
            (Some(identity), Some(resource)) if needs_lookup => {
                self.lookup(resource, identity.id, cancel).await?
            }
            _ => None,
        };

        let decision = decide(tier, team_role, &action, resource.is_some());

        tracing::debug!(
            action = %action,
            tier = %tier,
            team_role = ?team_role,
            resource = resource.map(|r| r.as_str()),
            allowed = decision.allowed,
            "permission evaluated"
        );

        Ok(decision)
    }

    /// Verify a bearer credential through `provider`, then evaluate.
    ///
    /// An absent credential is the anonymous caller. A credential that fails
    /// verification fails the whole call; it is never downgraded to anonymous.
    pub async fn evaluate_credential<P>(
        &self,
        provider: &P,
        credential: Option<&str>,
        action: impl Into<ActionName>,
        resource: Option<&ResourceId>,
        cancel: &CancellationToken,
    ) -> Result<(Option<Identity>, Decision), EvaluationError>
    where
        P: AuthProvider + ?Sized,
    {
        let identity = match credential {
            Some(credential) => Some(provider.verify(credential).await?),
            None => None,
        };

        let decision = self
            .evaluate(identity.as_ref(), action, resource, cancel)
            .await?;
        Ok((identity, decision))
    }

    async fn lookup(
        &self,
        resource: &ResourceId,
        identity: IdentityId,
        cancel: &CancellationToken,
    ) -> Result<Option<TeamRole>, EvaluationError> {
        let lookup = tokio::time::timeout(
            self.lookup_timeout,
            self.store.lookup_team_role(resource, identity),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(resource = %resource, "membership lookup cancelled");
                Err(EvaluationError::Aborted(AbortCause::Cancelled))
            }
            result = lookup => match result {
                Ok(Ok(role)) => Ok(role),
                Ok(Err(e)) => {
                    tracing::warn!(resource = %resource, error = %e, "membership lookup failed");
                    Err(EvaluationError::Lookup(e))
                }
                Err(_elapsed) => {
                    let timeout_ms = u64::try_from(self.lookup_timeout.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(resource = %resource, timeout_ms, "membership lookup timed out");
                    Err(EvaluationError::Aborted(AbortCause::TimedOut))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::action::PermissionAction;
    use crate::identity::SUBSCRIPTION_TIER_KEY;
    use crate::policy::DenialReason;
    use crate::tier::SubscriptionTier;

    #[derive(Default)]
    struct FakeStore {
        roles: Mutex<HashMap<(ResourceId, IdentityId), TeamRole>>,
        lookups: AtomicUsize,
        fail: bool,
        stall: bool,
    }

    impl FakeStore {
        fn with(resource: &ResourceId, identity: IdentityId, role: TeamRole) -> Self {
            let store = Self::default();
            store
                .roles
                .lock()
                .unwrap()
                .insert((resource.clone(), identity), role);
            store
        }
    }

    #[async_trait]
    impl MembershipStore for FakeStore {
        async fn lookup_team_role(
            &self,
            resource: &ResourceId,
            identity: IdentityId,
        ) -> Result<Option<TeamRole>, LookupError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(LookupError::unavailable("connection refused"));
            }
            Ok(self
                .roles
                .lock()
                .unwrap()
                .get(&(resource.clone(), identity))
                .copied())
        }
    }

    struct RejectAll;

    #[async_trait]
    impl AuthProvider for RejectAll {
        async fn verify(&self, _credential: &str) -> Result<Identity, VerificationError> {
            Err(VerificationError::Expired)
        }
    }

    fn free_identity() -> Identity {
        Identity::new(IdentityId::new())
    }

    fn paid_identity() -> Identity {
        Identity::new(IdentityId::new()).with_metadata(SUBSCRIPTION_TIER_KEY, "paid")
    }

    #[tokio::test]
    async fn free_non_member_cannot_view_reports_on_resource() {
        let a = free_identity();
        let resource = ResourceId::from(42);
        let evaluator = PermissionEvaluator::new(FakeStore::default());

        let d = evaluator
            .evaluate(Some(&a), PermissionAction::ViewReports, Some(&resource), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!d.allowed);
        assert_eq!(d.reason(), "Not a team member");
        assert_eq!(d.tier, SubscriptionTier::Free);
    }

    #[tokio::test]
    async fn paid_editor_views_reports_but_cannot_manage_team() {
        let b = paid_identity();
        let resource = ResourceId::from(42);
        let evaluator = PermissionEvaluator::new(FakeStore::with(&resource, b.id, TeamRole::Editor));
        let cancel = CancellationToken::new();

        let manage = evaluator
            .evaluate(Some(&b), PermissionAction::ManageTeam, Some(&resource), &cancel)
            .await
            .unwrap();
        assert!(!manage.allowed);
        assert_eq!(manage.reason(), "Requires manager role");
        assert_eq!(manage.team_role, Some(TeamRole::Editor));

        let view = evaluator
            .evaluate(Some(&b), PermissionAction::ViewReports, Some(&resource), &cancel)
            .await
            .unwrap();
        assert!(view.allowed);
    }

    #[tokio::test]
    async fn membership_is_scoped_per_resource() {
        let m = paid_identity();
        let managed = ResourceId::from(1);
        let other = ResourceId::from(2);
        let evaluator = PermissionEvaluator::new(FakeStore::with(&managed, m.id, TeamRole::Manager));
        let cancel = CancellationToken::new();

        let here = evaluator
            .evaluate(Some(&m), PermissionAction::ManageTeam, Some(&managed), &cancel)
            .await
            .unwrap();
        let there = evaluator
            .evaluate(Some(&m), PermissionAction::ManageTeam, Some(&other), &cancel)
            .await
            .unwrap();

        assert!(here.allowed);
        assert!(!there.allowed);
    }

    #[tokio::test]
    async fn anonymous_create_campaign_reports_anonymous_tier() {
        let evaluator = PermissionEvaluator::new(FakeStore::default());
        let d = evaluator
            .evaluate(None, PermissionAction::CreateCampaign, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!d.allowed);
        assert_eq!(d.tier, SubscriptionTier::Anonymous);
        assert_eq!(d.denial, Some(DenialReason::RequiresPaidSubscription));
    }

    #[tokio::test]
    async fn lookup_only_happens_for_team_scoped_actions_on_a_resource() {
        let identity = paid_identity();
        let resource = ResourceId::from(7);
        let evaluator = PermissionEvaluator::new(FakeStore::default());
        let cancel = CancellationToken::new();

        for action in [PermissionAction::TrackItems, PermissionAction::CreateCampaign] {
            evaluator.evaluate(Some(&identity), action, Some(&resource), &cancel).await.unwrap();
        }
        evaluator
            .evaluate(Some(&identity), PermissionAction::ManageTeam, None, &cancel)
            .await
            .unwrap();
        evaluator
            .evaluate(None, PermissionAction::ManageTeam, Some(&resource), &cancel)
            .await
            .unwrap();
        assert_eq!(evaluator.store().lookups.load(Ordering::SeqCst), 0);

        evaluator
            .evaluate(Some(&identity), PermissionAction::ViewReports, Some(&resource), &cancel)
            .await
            .unwrap();
        assert_eq!(evaluator.store().lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_evaluation_is_idempotent() {
        let identity = paid_identity();
        let resource = ResourceId::from(42);
        let evaluator = PermissionEvaluator::new(FakeStore::with(&resource, identity.id, TeamRole::Viewer));
        let cancel = CancellationToken::new();

        for action in PermissionAction::ALL {
            let first = evaluator.evaluate(Some(&identity), action, Some(&resource), &cancel).await.unwrap();
            let second = evaluator.evaluate(Some(&identity), action, Some(&resource), &cancel).await.unwrap();
            assert_eq!(first, second);
        }
    }

    fn any_role() -> impl proptest::strategy::Strategy<Value = Option<TeamRole>> {
        use proptest::prelude::*;
        prop_oneof![
            Just(None),
            Just(Some(TeamRole::Manager)),
            Just(Some(TeamRole::Editor)),
            Just(Some(TeamRole::Viewer)),
        ]
    }

    proptest::proptest! {
        #[test]
        fn evaluation_is_idempotent_for_any_membership(
            role in any_role(),
            tier in proptest::option::of(proptest::sample::select(vec!["paid", "free", "gold"])),
            anonymous in proptest::bool::ANY,
            scoped in proptest::bool::ANY,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            let mut identity = Identity::new(IdentityId::new());
            if let Some(tier) = tier {
                identity = identity.with_metadata(SUBSCRIPTION_TIER_KEY, tier);
            }
            let resource = ResourceId::from(7);
            let store = match role {
                Some(role) => FakeStore::with(&resource, identity.id, role),
                None => FakeStore::default(),
            };
            let evaluator = PermissionEvaluator::new(store);
            let caller = (!anonymous).then_some(&identity);
            let target = scoped.then_some(&resource);
            let cancel = CancellationToken::new();

            rt.block_on(async {
                for action in PermissionAction::ALL {
                    let first = evaluator.evaluate(caller, action, target, &cancel).await.unwrap();
                    let second = evaluator.evaluate(caller, action, target, &cancel).await.unwrap();
                    assert_eq!(first, second);
                }
            });
        }
    }

    #[tokio::test]
    async fn lookup_failure_is_an_error_not_a_denial() {
        let identity = paid_identity();
        let store = FakeStore {
            fail: true,
            ..FakeStore::default()
        };
        let evaluator = PermissionEvaluator::new(store);

        let err = evaluator
            .evaluate(Some(&identity), PermissionAction::ManageTeam, Some(&ResourceId::from(1)), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Lookup(LookupError::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out_as_aborted() {
        let identity = paid_identity();
        let store = FakeStore {
            stall: true,
            ..FakeStore::default()
        };
        let evaluator = PermissionEvaluator::new(store).with_lookup_timeout(Duration::from_millis(50));

        let err = evaluator
            .evaluate(Some(&identity), PermissionAction::ViewReports, Some(&ResourceId::from(1)), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, EvaluationError::Aborted(AbortCause::TimedOut));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_deciding() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let evaluator = PermissionEvaluator::new(FakeStore::default());

        let err = evaluator
            .evaluate(None, PermissionAction::TrackItems, None, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, EvaluationError::Aborted(AbortCause::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_lookup_aborts() {
        let identity = paid_identity();
        let store = FakeStore {
            stall: true,
            ..FakeStore::default()
        };
        let evaluator = PermissionEvaluator::new(store).with_lookup_timeout(Duration::from_secs(600));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = evaluator
            .evaluate(Some(&identity), PermissionAction::ManageTeam, Some(&ResourceId::from(1)), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, EvaluationError::Aborted(AbortCause::Cancelled));
    }

    #[tokio::test]
    async fn absent_credential_evaluates_as_anonymous() {
        let evaluator = PermissionEvaluator::new(FakeStore::default());
        let (identity, d) = evaluator
            .evaluate_credential(&RejectAll, None, PermissionAction::TrackItems, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(identity.is_none());
        assert_eq!(d.reason(), "Must be registered to track items");
    }

    #[tokio::test]
    async fn rejected_credential_fails_the_call() {
        let evaluator = PermissionEvaluator::new(FakeStore::default());
        let err = evaluator
            .evaluate_credential(&RejectAll, Some("stale"), PermissionAction::TrackItems, None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, EvaluationError::Verification(VerificationError::Expired));
    }
}
