//! The fixed permission policy table.
//!
//! - No IO
//! - No panics
//! - Denials are ordinary values, never errors

use serde::Serialize;

use crate::action::{ActionName, PermissionAction};
use crate::team::TeamRole;
use crate::tier::SubscriptionTier;

/// Why a decision came out as "denied".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum DenialReason {
    MustBeRegisteredToTrack,
    RequiresPaidSubscription,
    MustBeRegistered,
    NotATeamMember,
    RequiresManagerRole,
    RequiresEditorRole,
    UnknownAction,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::MustBeRegisteredToTrack => "Must be registered to track items",
            DenialReason::RequiresPaidSubscription => "Requires paid subscription",
            DenialReason::MustBeRegistered => "Must be registered",
            DenialReason::NotATeamMember => "Not a team member",
            DenialReason::RequiresManagerRole => "Requires manager role",
            DenialReason::RequiresEditorRole => "Requires manager or editor role",
            DenialReason::UnknownAction => "Unknown action",
        }
    }
}

impl From<DenialReason> for &'static str {
    fn from(value: DenialReason) -> Self {
        value.as_str()
    }
}

impl core::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a permission evaluation, together with the inputs that were
/// resolved along the way (for the caller's diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub denial: Option<DenialReason>,
    pub tier: SubscriptionTier,
    pub team_role: Option<TeamRole>,
}

impl Decision {
    fn allow(tier: SubscriptionTier, team_role: Option<TeamRole>) -> Self {
        Self {
            allowed: true,
            denial: None,
            tier,
            team_role,
        }
    }

    fn deny(tier: SubscriptionTier, team_role: Option<TeamRole>, reason: DenialReason) -> Self {
        Self {
            allowed: false,
            denial: Some(reason),
            tier,
            team_role,
        }
    }

    /// Narrow an allowed `view_reports` decision on a resource to members who
    /// may edit it. Denials pass through unchanged.
    pub fn require_editor(self) -> Self {
        match self.team_role {
            _ if !self.allowed => self,
            Some(role) if role.can_edit() => self,
            role => Decision::deny(self.tier, role, DenialReason::RequiresEditorRole),
        }
    }

    /// Human-readable reason; empty when allowed.
    pub fn reason(&self) -> &'static str {
        self.denial.map(|d| d.as_str()).unwrap_or("")
    }
}

/// Apply the policy table.
///
/// `resource_scoped` says whether the caller named a resource; `team_role` is
/// the caller's role on that resource (`None` when not a member or when no
/// lookup was made).
pub fn decide(
    tier: SubscriptionTier,
    team_role: Option<TeamRole>,
    action: &ActionName,
    resource_scoped: bool,
) -> Decision {
    let Some(action) = action.known() else {
        return Decision::deny(tier, team_role, DenialReason::UnknownAction);
    };

    match action {
        PermissionAction::TrackItems => {
            if tier.is_registered() {
                Decision::allow(tier, team_role)
            } else {
                Decision::deny(tier, team_role, DenialReason::MustBeRegisteredToTrack)
            }
        }
        PermissionAction::CreateCampaign => {
            if tier == SubscriptionTier::Paid {
                Decision::allow(tier, team_role)
            } else {
                Decision::deny(tier, team_role, DenialReason::RequiresPaidSubscription)
            }
        }
        PermissionAction::ViewReports => {
            if !tier.is_registered() {
                Decision::deny(tier, team_role, DenialReason::MustBeRegistered)
            } else if resource_scoped && team_role.is_none() {
                Decision::deny(tier, team_role, DenialReason::NotATeamMember)
            } else {
                // Any membership role may view; without a resource the check is tier-only.
                Decision::allow(tier, team_role)
            }
        }
        PermissionAction::ManageTeam => {
            if team_role == Some(TeamRole::Manager) {
                Decision::allow(tier, team_role)
            } else {
                Decision::deny(tier, team_role, DenialReason::RequiresManagerRole)
            }
        }
    }
}
