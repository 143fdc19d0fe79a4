//! Request/response DTOs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use billtrack_auth::{
    ActionName, Decision, GateOutcome, Identity, PermissionSet, RouteGate, SubscriptionTier, TeamRole,
    derive_permission_set,
};
use billtrack_core::{IdentityId, ResourceId};
use billtrack_infra::{ItemKind, Membership, TrackOutcome, TrackedItem};

#[derive(Debug, Deserialize)]
pub struct PermissionCheckRequest {
    pub action: ActionName,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheckResponse {
    pub allowed: bool,
    pub reason: &'static str,
    pub tier: SubscriptionTier,
    pub team_role: Option<TeamRole>,
    pub identity_id: Option<IdentityId>,
}

impl PermissionCheckResponse {
    pub fn new(identity: Option<&Identity>, decision: &Decision) -> Self {
        Self {
            allowed: decision.allowed,
            reason: decision.reason(),
            tier: decision.tier,
            team_role: decision.team_role,
            identity_id: identity.map(|i| i.id),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmIResponse {
    pub identity_id: Option<IdentityId>,
    pub email: Option<String>,
    pub tier: SubscriptionTier,
    pub permissions: PermissionSet,
    /// Tier-gated client pages and whether this caller gets to see them.
    pub pages: BTreeMap<&'static str, PageAccess>,
}

#[derive(Debug, Serialize)]
pub struct PageAccess {
    pub render: bool,
    pub redirect: Option<String>,
}

impl From<GateOutcome> for PageAccess {
    fn from(outcome: GateOutcome) -> Self {
        match outcome {
            GateOutcome::Render => Self {
                render: true,
                redirect: None,
            },
            GateOutcome::Redirect(fallback) => Self {
                render: false,
                redirect: Some(fallback.path().to_string()),
            },
        }
    }
}

fn page_gates() -> [(&'static str, RouteGate); 3] {
    [
        ("dashboard", RouteGate::default()),
        ("profile", RouteGate::default()),
        ("campaigns", RouteGate::paid_only()),
    ]
}

impl WhoAmIResponse {
    pub fn new(identity: Option<&Identity>, tier: SubscriptionTier) -> Self {
        Self {
            identity_id: identity.map(|i| i.id),
            email: identity.and_then(|i| i.email.clone()),
            tier,
            permissions: derive_permission_set(tier),
            pages: page_gates()
                .into_iter()
                .map(|(page, gate)| (page, PageAccess::from(gate.check(tier))))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: IdentityId,
    pub role: TeamRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: TeamRole,
}

#[derive(Debug, Serialize)]
pub struct MemberDto {
    pub user_id: IdentityId,
    pub role: TeamRole,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl From<Membership> for MemberDto {
    fn from(m: Membership) -> Self {
        Self {
            user_id: m.identity,
            role: m.role,
            joined_at: m.joined_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCampaignItemsRequest {
    pub item_type: ItemKind,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackItemRequest {
    pub item_type: ItemKind,
    pub item_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackItemResponse {
    pub already_tracking: bool,
    pub item: TrackedItem,
}

impl From<TrackOutcome> for TrackItemResponse {
    fn from(outcome: TrackOutcome) -> Self {
        match outcome {
            TrackOutcome::Tracked(item) => Self {
                already_tracking: false,
                item,
            },
            TrackOutcome::AlreadyTracking(item) => Self {
                already_tracking: true,
                item,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whoami_reports_gated_pages_per_tier() {
        let anon = WhoAmIResponse::new(None, SubscriptionTier::Anonymous);
        assert!(!anon.pages["dashboard"].render);
        assert_eq!(anon.pages["campaigns"].redirect.as_deref(), Some("/login"));

        let free = WhoAmIResponse::new(None, SubscriptionTier::Free);
        assert!(free.pages["dashboard"].render);
        assert_eq!(free.pages["campaigns"].redirect.as_deref(), Some("/pricing"));

        let paid = WhoAmIResponse::new(None, SubscriptionTier::Paid);
        assert!(paid.pages.values().all(|p| p.render));
    }
}
